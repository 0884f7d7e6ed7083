use std::io::{self, BufRead, Write};
use stimscore::types::BaselineKey;

/// Asks the operator which recorded setting to use as the patient's baseline.
///
/// Empty input picks `Med Off - DBS Off` when it was recorded. `skip` or end of input
/// returns `None`, meaning the patient is not analyzed. Anything else unusable
/// re-prompts.
pub fn select_baseline<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    patient_id: &str,
    available: &[BaselineKey],
) -> io::Result<Option<BaselineKey>> {
    if available.is_empty() {
        return Ok(None);
    }

    writeln!(output, "\n--- Select a baseline for patient {patient_id} ---")?;
    for (idx, key) in available.iter().enumerate() {
        writeln!(output, "  {}: {key}", idx + 1)?;
    }
    let default = available
        .iter()
        .position(|key| *key == BaselineKey::MED_OFF_DBS_OFF);

    let mut line = String::new();
    loop {
        match default {
            Some(idx) => write!(output, "Enter number for baseline (default is {}), or 'skip': ", idx + 1)?,
            None => write!(output, "Enter number for baseline, or 'skip': ")?,
        }
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(None);
        }
        let answer = line.trim().to_ascii_lowercase();

        if answer == "skip" {
            return Ok(None);
        }
        if answer.is_empty() {
            if let Some(idx) = default {
                return Ok(Some(available[idx]));
            }
            writeln!(output, "Error: there is no default, enter a number or 'skip'.")?;
            continue;
        }
        match answer.parse::<usize>() {
            Ok(number) if (1..=available.len()).contains(&number) => {
                return Ok(Some(available[number - 1]));
            }
            Ok(_) => writeln!(output, "Error: number is out of range.")?,
            Err(_) => writeln!(output, "Error: invalid input, enter a number or 'skip'.")?,
        }
    }
}

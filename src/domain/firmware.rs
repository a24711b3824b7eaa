use crate::error::{PollError, Result};

/// Oldest controller release that reports separate read and write bandwidth.
pub const MINIMUM_FW_VERSION: &str = "2.3.0";

fn components(version: &str) -> Result<Vec<u64>> {
    version
        .trim()
        .split('.')
        .map(|part| {
            part.parse::<u64>().map_err(|_| PollError::MalformedVersion {
                version: version.to_string(),
            })
        })
        .collect()
}

/// Compares dotted versions numerically, left to right, over the
/// components both strings have. The first differing component decides.
pub fn meets_minimum(found: &str, minimum: &str) -> Result<bool> {
    let found_parts = components(found)?;
    let min_parts = components(minimum)?;

    for (f, m) in found_parts.iter().zip(min_parts.iter()) {
        if f > m {
            return Ok(true);
        }
        if f < m {
            return Ok(false);
        }
    }
    Ok(true)
}

pub fn check_minimum(host: &str, found: &str, minimum: &str) -> Result<()> {
    if meets_minimum(found, minimum)? {
        Ok(())
    } else {
        Err(PollError::MinimumVersionUnmet {
            host: host.to_string(),
            found: found.to_string(),
            minimum: minimum.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_not_lexical() {
        assert!(meets_minimum("2.10.0", "2.3.0").unwrap());
        assert!(!meets_minimum("2.2.9", "2.3.0").unwrap());
    }

    #[test]
    fn first_difference_decides() {
        assert!(meets_minimum("3.0.0.1234", "2.3.0").unwrap());
        assert!(!meets_minimum("1.9.9.9", "2.3.0").unwrap());
        assert!(meets_minimum("2.3.0.16425", MINIMUM_FW_VERSION).unwrap());
    }

    #[test]
    fn equal_prefix_passes() {
        assert!(meets_minimum("2.3", "2.3.0").unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            meets_minimum("2.x.0", "2.3.0"),
            Err(PollError::MalformedVersion { .. })
        ));
    }

    #[test]
    fn check_names_the_controller() {
        let err = check_minimum("sfa-c", "2.2.0", MINIMUM_FW_VERSION).unwrap_err();
        assert!(err.to_string().contains("sfa-c"));
    }
}

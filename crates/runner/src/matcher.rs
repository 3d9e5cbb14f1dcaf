//! Step-pattern parsing (spec.md §4.6): the `--proof-at`/`--snapshot-at`/`--stop-at`/`--info-at`/
//! `--opc-at` flag DSL.

use std::str::FromStr;

/// A parsed step-matching predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPattern {
    /// Never matches.
    Never,
    /// Matches every step.
    Always,
    /// Matches exactly one step.
    Exactly(u64),
    /// Matches every `n`th step (`n` must be nonzero).
    EveryN(u64),
}

impl StepPattern {
    /// Evaluate this pattern against `step`.
    pub fn matches(&self, step: u64) -> bool {
        match self {
            StepPattern::Never => false,
            StepPattern::Always => true,
            StepPattern::Exactly(n) => step == *n,
            StepPattern::EveryN(n) => *n > 0 && step % n == 0,
        }
    }
}

impl FromStr for StepPattern {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never" => Ok(StepPattern::Never),
            "always" => Ok(StepPattern::Always),
            _ => {
                if let Some(rest) = s.strip_prefix('=') {
                    let n = rest
                        .parse::<u64>()
                        .map_err(|_| anyhow::anyhow!("invalid step pattern `{s}`: expected `=N`"))?;
                    Ok(StepPattern::Exactly(n))
                } else if let Some(rest) = s.strip_prefix('%') {
                    let n = rest
                        .parse::<u64>()
                        .map_err(|_| anyhow::anyhow!("invalid step pattern `{s}`: expected `%N`"))?;
                    if n == 0 {
                        anyhow::bail!("invalid step pattern `{s}`: `%N` requires N > 0");
                    }
                    Ok(StepPattern::EveryN(n))
                } else {
                    anyhow::bail!(
                        "invalid step pattern `{s}`: expected one of `never`, `always`, `=N`, `%N`"
                    )
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn never_matches_nothing() {
        let p: StepPattern = "never".parse().unwrap();
        assert!(!p.matches(0));
        assert!(!p.matches(1_000_000));
    }

    #[test]
    fn always_matches_every_step() {
        let p: StepPattern = "always".parse().unwrap();
        assert!(p.matches(0));
        assert!(p.matches(42));
    }

    #[test]
    fn exactly_matches_one_step() {
        let p: StepPattern = "=42".parse().unwrap();
        assert!(p.matches(42));
        assert!(!p.matches(41));
    }

    #[test]
    fn every_n_matches_multiples() {
        let p: StepPattern = "%10".parse().unwrap();
        assert!(p.matches(0));
        assert!(p.matches(10));
        assert!(p.matches(20));
        assert!(!p.matches(15));
    }

    #[test]
    fn every_zero_is_a_configuration_error() {
        assert!("%0".parse::<StepPattern>().is_err());
    }

    #[test]
    fn garbage_is_a_configuration_error() {
        assert!("whenever".parse::<StepPattern>().is_err());
        assert!("=".parse::<StepPattern>().is_err());
        assert!("%".parse::<StepPattern>().is_err());
        assert!("=abc".parse::<StepPattern>().is_err());
    }
}

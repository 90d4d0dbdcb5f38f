//! Height-scoped lookup of [`PortalParams`].

use std::{fs, path::Path};

use portal_primitives::BeaconHeight;
use serde::{Deserialize, Serialize};

use crate::{
    errors::{ParamsError, ParamsResult},
    params::PortalParams,
};

/// Params that take effect from `start_height` onward.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ParamsEntry {
    pub start_height: BeaconHeight,
    pub params: PortalParams,
}

/// Ordered list of params entries.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ParamsSchedule {
    entries: Vec<ParamsEntry>,
}

impl ParamsSchedule {
    pub fn new(entries: Vec<ParamsEntry>) -> ParamsResult<Self> {
        let sched = Self { entries };
        sched.validate()?;
        Ok(sched)
    }

    /// Schedule with one entry covering every height.
    pub fn single(params: PortalParams) -> ParamsResult<Self> {
        Self::new(vec![ParamsEntry {
            start_height: 0,
            params,
        }])
    }

    pub fn entries(&self) -> &[ParamsEntry] {
        &self.entries
    }

    /// Params in force at `height`.
    ///
    /// A height before the first entry has no params, which is a fatal
    /// configuration error for the caller.
    pub fn params_at(&self, height: BeaconHeight) -> ParamsResult<&PortalParams> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.start_height <= height)
            .map(|e| &e.params)
            .ok_or(ParamsError::MissingEpochParams(height))
    }

    pub fn validate(&self) -> ParamsResult<()> {
        if self.entries.is_empty() {
            return Err(ParamsError::EmptySchedule);
        }
        for pair in self.entries.windows(2) {
            if pair[1].start_height <= pair[0].start_height {
                return Err(ParamsError::UnorderedSchedule(pair[1].start_height));
            }
        }
        for entry in &self.entries {
            entry.params.validate()?;
        }
        Ok(())
    }

    pub fn from_toml_str(s: &str) -> ParamsResult<Self> {
        let sched: Self = toml::from_str(s)?;
        sched.validate()?;
        Ok(sched)
    }

    pub fn from_json_str(s: &str) -> ParamsResult<Self> {
        let sched: Self = serde_json::from_str(s)?;
        sched.validate()?;
        Ok(sched)
    }

    /// Loads a schedule, picking the format from the file extension.
    pub fn load_from_path(path: &Path) -> ParamsResult<Self> {
        let raw = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&raw),
            Some("json") => Self::from_json_str(&raw),
            other => Err(ParamsError::UnknownFormat(
                other.unwrap_or_default().to_owned(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use portal_primitives::TokenId;

    use super::*;

    const SAMPLE: &str = r#"
[[entries]]
start_height = 0

[entries.params]
time_out_porting_request = 10
time_out_redeem_request = 10
time_out_custodian_return_pub_token = 20
tp120 = 120
tp130 = 130
min_percent_locked_collateral = 150
max_percent_liquidated_collateral_amount = 120
min_percent_porting_fee = 1
min_percent_redeem_fee = 1
min_percent_custodian_rewards = 10
max_percent_custodian_rewards = 30
epoch_length = 100
native_decimals = 9
feeders = ["feeder-1"]

[entries.params.supported_collaterals]
usdt = 6

[entries.params.supported_ptokens]
pBTC = 9
pBNB = 9

[[entries]]
start_height = 500

[entries.params]
time_out_porting_request = 20
time_out_redeem_request = 20
time_out_custodian_return_pub_token = 40
tp120 = 120
tp130 = 130
min_percent_locked_collateral = 200
max_percent_liquidated_collateral_amount = 120
min_percent_porting_fee = 1
min_percent_redeem_fee = 1
min_percent_custodian_rewards = 10
max_percent_custodian_rewards = 30
epoch_length = 100
native_decimals = 9

[entries.params.supported_ptokens]
pBTC = 9
"#;

    #[test]
    fn test_params_at_picks_latest_entry() {
        let sched = ParamsSchedule::from_toml_str(SAMPLE).expect("parse schedule");
        let early = sched.params_at(499).expect("params at 499");
        assert_eq!(early.min_percent_locked_collateral, 150);
        assert!(early.is_feeder(&"feeder-1".into()));

        let late = sched.params_at(500).expect("params at 500");
        assert_eq!(late.min_percent_locked_collateral, 200);
        assert!(late.feeders.is_empty());
    }

    #[test]
    fn test_missing_epoch_params_is_an_error() {
        let sched = ParamsSchedule::from_toml_str(SAMPLE).expect("parse schedule");
        let mut entries = sched.entries().to_vec();
        entries.remove(0);
        let sched = ParamsSchedule::new(entries).expect("valid schedule");
        assert!(matches!(
            sched.params_at(10),
            Err(ParamsError::MissingEpochParams(10))
        ));
    }

    #[test]
    fn test_decimals_lookup() {
        let sched = ParamsSchedule::from_toml_str(SAMPLE).expect("parse schedule");
        let params = sched.params_at(0).expect("params");
        assert_eq!(params.decimals_of(&"usdt".into()).expect("usdt"), 6);
        assert_eq!(
            params
                .decimals_of(&TokenId::native())
                .expect("native"),
            9
        );
        assert!(params.decimals_of(&"pETH".into()).is_err());
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let sched = ParamsSchedule::from_toml_str(SAMPLE).expect("parse schedule");
        let mut params = sched.params_at(0).expect("params").clone();
        params.tp130 = params.tp120;
        assert!(matches!(params.validate(), Err(ParamsError::Invalid(_))));
    }

    #[test]
    fn test_rejects_unordered_schedule() {
        let sched = ParamsSchedule::from_toml_str(SAMPLE).expect("parse schedule");
        let mut entries = sched.entries().to_vec();
        entries.reverse();
        assert!(matches!(
            ParamsSchedule::new(entries),
            Err(ParamsError::UnorderedSchedule(_))
        ));
    }
}

//! Provisioning labels and label filters.
//!
//! Every network and container a run creates carries the run's common labels.
//! Teardown rebuilds the same labels from the run name and asks the engine for
//! everything matching them, so the labels are the only record of ownership.

use std::collections::{BTreeMap, HashMap};

/// Label carrying the provisioning run name.
pub const PROVISIONING_ID_LABEL: &str = "provisioning-id";

/// Label carrying the container role (`tx-manager` or `quorum`).
pub const ROLE_LABEL: &str = "provisioning-role";

/// Label carrying the node index a container belongs to.
pub const NODE_INDEX_LABEL: &str = "provisioning-node-index";

/// Ordered label map.
pub type Labels = BTreeMap<String, String>;

/// Labels shared by every resource of the run called `name`.
pub fn common_labels(name: &str) -> Labels {
    Labels::from([(PROVISIONING_ID_LABEL.to_string(), name.to_string())])
}

/// AND-combined set of `key=value` requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelFilter {
    required: Labels,
}

impl LabelFilter {
    pub fn from_labels(labels: &Labels) -> Self {
        Self {
            required: labels.clone(),
        }
    }

    /// Filter selecting every resource of the run called `name`.
    pub fn for_run(name: &str) -> Self {
        Self::from_labels(&common_labels(name))
    }

    /// `key=value` pairs, one per required label.
    pub fn pairs(&self) -> Vec<String> {
        self.required
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect()
    }

    /// Engine query form: `{"label": ["k1=v1", "k2=v2"]}`.
    pub fn to_query(&self) -> HashMap<String, Vec<String>> {
        HashMap::from([("label".to_string(), self.pairs())])
    }

    /// True when every required label is present with the same value.
    pub fn matches<'a, I>(&self, labels: I) -> bool
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let present: HashMap<&String, &String> = labels.into_iter().collect();
        self.required
            .iter()
            .all(|(k, v)| present.get(k).is_some_and(|found| *found == v))
    }
}

//! Comparison of a local template against its remote counterpart.
//!
//! Display name is the only matching key. The fingerprint label is the
//! only change signal; nothing else on the remote side is inspected.

use serde::Serialize;

use crate::registry::RemoteTemplate;
use crate::template::{Fingerprinter, LocalTemplate};

/// Outcome of comparing one local template with the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    /// No remote template shares the display name.
    NoMatch,
    /// A remote template shares the display name and the fingerprint.
    Identical,
    /// A remote template shares the display name but not the fingerprint.
    Changed(ChangeReason),
}

/// Why a matched remote template counts as changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ChangeReason {
    /// The remote fingerprint label differs from the local fingerprint.
    FingerprintDiffers {
        /// Fingerprint recorded remotely.
        remote: String,
    },
    /// The remote template has labels but no fingerprint.
    MissingFingerprint,
    /// The remote template has no labels at all.
    NoLabels,
}

/// Compares a local template with its candidate remote match.
///
/// A candidate whose display name differs from the local one is treated
/// as no match.
#[must_use]
pub fn compare(local: &LocalTemplate, remote: Option<&RemoteTemplate>) -> Comparison {
    let Some(remote) = remote.filter(|r| r.display_name == local.display_name) else {
        return Comparison::NoMatch;
    };

    if !remote.has_labels() {
        return Comparison::Changed(ChangeReason::NoLabels);
    }

    match remote.fingerprint() {
        None => Comparison::Changed(ChangeReason::MissingFingerprint),
        Some(fp) if Fingerprinter::matches(fp, local.fingerprint()) => Comparison::Identical,
        Some(fp) => Comparison::Changed(ChangeReason::FingerprintDiffers {
            remote: fp.to_string(),
        }),
    }
}

impl std::fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FingerprintDiffers { remote } => {
                let short = Fingerprinter::new().short(remote);
                write!(f, "fingerprint changed (remote {short})")
            }
            Self::MissingFingerprint => write!(f, "remote has no fingerprint label"),
            Self::NoLabels => write!(f, "remote has no labels"),
        }
    }
}

impl std::fmt::Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoMatch => write!(f, "no remote template"),
            Self::Identical => write!(f, "unchanged"),
            Self::Changed(reason) => write!(f, "{reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn local(name: &str, fp: &str) -> LocalTemplate {
        LocalTemplate::from_document(format!("{name}.yaml"), fp, json!({ "displayName": name }))
            .expect("valid template")
    }

    fn remote(name: &str, labels: Option<serde_json::Value>) -> RemoteTemplate {
        let mut raw = json!({ "name": format!("r-{name}"), "displayName": name });
        if let Some(labels) = labels {
            raw["labels"] = labels;
        }
        serde_json::from_value(raw).expect("valid template")
    }

    #[test]
    fn test_no_match() {
        assert_eq!(compare(&local("a", "h1"), None), Comparison::NoMatch);
        let other = remote("b", Some(json!({ "fingerprint": "h1" })));
        assert_eq!(compare(&local("a", "h1"), Some(&other)), Comparison::NoMatch);
    }

    #[test]
    fn test_identical() {
        let r = remote("a", Some(json!({ "fingerprint": "h1", "team": "ml" })));
        assert_eq!(compare(&local("a", "h1"), Some(&r)), Comparison::Identical);
    }

    #[test]
    fn test_changed_reasons() {
        let differs = remote("a", Some(json!({ "fingerprint": "h0" })));
        assert_eq!(
            compare(&local("a", "h1"), Some(&differs)),
            Comparison::Changed(ChangeReason::FingerprintDiffers {
                remote: String::from("h0")
            })
        );

        let missing = remote("a", Some(json!({ "team": "ml" })));
        assert_eq!(
            compare(&local("a", "h1"), Some(&missing)),
            Comparison::Changed(ChangeReason::MissingFingerprint)
        );

        let unlabeled = remote("a", None);
        assert_eq!(
            compare(&local("a", "h1"), Some(&unlabeled)),
            Comparison::Changed(ChangeReason::NoLabels)
        );

        let empty = remote("a", Some(json!({})));
        assert_eq!(
            compare(&local("a", "h1"), Some(&empty)),
            Comparison::Changed(ChangeReason::NoLabels)
        );
    }
}

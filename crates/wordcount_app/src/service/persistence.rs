use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use wordcount_core::CountState;
use wordcount_engine::{read_state_file, reset_state_dir, write_state_file};
use wordcount_logging::{wc_info, wc_warn};

const SNAPSHOT_FILENAME: &str = "counts.ron";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct PersistedCounts {
    application_id: String,
    saved_utc: String,
    counts: Vec<(String, u64)>,
}

/// Everything this application persists lives in `{state_dir}/{application_id}`.
fn application_dir(state_dir: &Path, application_id: &str) -> anyhow::Result<PathBuf> {
    let mut components = Path::new(application_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(state_dir.join(application_id)),
        _ => bail!("application id {:?} is not a plain directory name", application_id),
    }
}

/// Produces the state the pipeline starts from.
///
/// With `reset` the application's own state directory is emptied first;
/// anything else under `state_dir` is left alone. Otherwise the counts saved
/// by the last orderly stop are loaded; a snapshot written by another
/// application id, or one that cannot be parsed, is ignored with a warning.
pub(crate) fn prepare_state(state_dir: &Path, application_id: &str, reset: bool) -> anyhow::Result<CountState> {
    let dir = &application_dir(state_dir, application_id)?;
    if reset {
        let removed = reset_state_dir(dir)
            .with_context(|| format!("failed to reset state directory {:?}", dir))?;
        wc_info!("reset state directory {:?} ({} entries removed)", dir, removed);
        return Ok(CountState::new());
    }

    let Some(content) = read_state_file(dir, SNAPSHOT_FILENAME)
        .with_context(|| format!("failed to read snapshot in {:?}", dir))?
    else {
        wc_info!("no snapshot in {:?}; starting empty", dir);
        return Ok(CountState::new());
    };

    let persisted: PersistedCounts = match ron::from_str(&content) {
        Ok(persisted) => persisted,
        Err(err) => {
            wc_warn!("Failed to parse snapshot in {:?}: {}", dir, err);
            return Ok(CountState::new());
        }
    };
    if persisted.application_id != application_id {
        wc_warn!(
            "snapshot in {:?} belongs to {}; starting empty",
            dir,
            persisted.application_id
        );
        return Ok(CountState::new());
    }

    let state = CountState::from_counts(persisted.counts);
    wc_info!(
        "loaded {} words from snapshot saved at {}",
        state.len(),
        persisted.saved_utc
    );
    Ok(state)
}

pub(crate) fn save_snapshot(state_dir: &Path, application_id: &str, state: &CountState) -> anyhow::Result<PathBuf> {
    let dir = &application_dir(state_dir, application_id)?;
    let persisted = PersistedCounts {
        application_id: application_id.to_string(),
        saved_utc: Utc::now().to_rfc3339(),
        counts: state
            .iter()
            .map(|(word, count)| (word.to_string(), count))
            .collect(),
    };
    let content = ron::ser::to_string_pretty(&persisted, ron::ser::PrettyConfig::new())
        .context("failed to serialize snapshot")?;
    let path = write_state_file(dir, SNAPSHOT_FILENAME, &content)
        .with_context(|| format!("failed to write snapshot to {:?}", dir))?;
    wc_info!("saved {} words to {:?}", state.len(), path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    const APP: &str = "wordcount-lambda-example";

    #[test]
    fn snapshot_is_loaded_when_reset_is_off() {
        let temp = TempDir::new().unwrap();
        let state = CountState::from_counts([("kafka", 3u64), ("streams", 2)]);
        save_snapshot(temp.path(), APP, &state).unwrap();

        let loaded = prepare_state(temp.path(), APP, false).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn reset_discards_previous_snapshot() {
        let temp = TempDir::new().unwrap();
        let saved = save_snapshot(temp.path(), APP, &CountState::from_counts([("kafka", 3u64)])).unwrap();
        assert_eq!(saved, temp.path().join(APP).join(SNAPSHOT_FILENAME));

        let loaded = prepare_state(temp.path(), APP, true).unwrap();
        assert!(loaded.is_empty());
        assert!(temp.path().join(APP).is_dir());
        assert_eq!(fs::read_dir(temp.path().join(APP)).unwrap().count(), 0);
    }

    #[test]
    fn reset_leaves_unrelated_entries_alone() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("notes.txt"), "keep me").unwrap();
        save_snapshot(temp.path(), "other-app", &CountState::from_counts([("a", 1u64)])).unwrap();
        save_snapshot(temp.path(), APP, &CountState::from_counts([("kafka", 3u64)])).unwrap();

        assert!(prepare_state(temp.path(), APP, true).unwrap().is_empty());

        assert_eq!(fs::read_to_string(temp.path().join("notes.txt")).unwrap(), "keep me");
        let other = prepare_state(temp.path(), "other-app", false).unwrap();
        assert_eq!(other.get("a"), Some(1));
    }

    #[test]
    fn application_id_must_be_a_single_path_component() {
        let temp = TempDir::new().unwrap();
        for id in ["", ".", "..", "../escape", "a/b"] {
            assert!(prepare_state(temp.path(), id, true).is_err(), "{id:?}");
        }
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_or_foreign_or_corrupt_snapshot_starts_empty() {
        let temp = TempDir::new().unwrap();
        assert!(prepare_state(temp.path(), APP, false).unwrap().is_empty());

        // A snapshot copied in from another application.
        let foreign = save_snapshot(temp.path(), "other-app", &CountState::from_counts([("a", 1u64)])).unwrap();
        fs::create_dir_all(temp.path().join(APP)).unwrap();
        fs::copy(&foreign, temp.path().join(APP).join(SNAPSHOT_FILENAME)).unwrap();
        assert!(prepare_state(temp.path(), APP, false).unwrap().is_empty());

        fs::write(temp.path().join(APP).join(SNAPSHOT_FILENAME), "not ron at all (").unwrap();
        assert!(prepare_state(temp.path(), APP, false).unwrap().is_empty());
    }
}

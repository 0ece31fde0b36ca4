use std::fs;

use async_trait::async_trait;
use cmdgate_engine::{Command, ParsedLayers, RowSender, StructuredCommand};
use cmdgate_registry::{CommandRepository, LocateError, RepositoryEvent, load_repositories};
use cmdgate_types::{CommandDescription, Row};
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Static;

#[async_trait]
impl StructuredCommand for Static {
    async fn run(&self, _parameters: &ParsedLayers, rows: &RowSender) -> anyhow::Result<()> {
        let row: Row = [("a".to_string(), json!(1))].into_iter().collect();
        rows.send(row).await?;
        Ok(())
    }
}

fn structured(parents: &[&str], name: &str) -> Command {
    let parents = parents.iter().map(|segment| segment.to_string()).collect();
    Command::structured(CommandDescription::new(name, parents), Static)
}

#[test]
fn repositories_merge_and_report_conflicts() {
    let first = tempfile::tempdir().expect("temp dir");
    let second = tempfile::tempdir().expect("temp dir");
    fs::create_dir_all(first.path().join("foo")).expect("create foo");
    fs::create_dir_all(second.path().join("foo")).expect("create foo");
    fs::write(first.path().join("foo/bar.yaml"), "short: first\nrows: [{ a: 1 }]\n").expect("write first");
    fs::write(second.path().join("foo/bar.yaml"), "short: second\nrows: [{ a: 2 }]\n").expect("write second");
    fs::write(second.path().join("foo/qux.yaml"), "type: text\ntext: qux\naliases: [{ name: quux, parents: [] }]\n").expect("write qux");

    let trie = load_repositories(&[first.path().to_path_buf(), second.path().to_path_buf()]).expect("repositories load");
    let repository = CommandRepository::new(trie.all());

    let error = repository.locate("foo/bar").unwrap_err();
    assert_eq!(error.to_string(), "command foo/bar is ambiguous, could be one of: foo bar, foo bar");
    assert_eq!(repository.locate("quux").expect("alias registered").description().path(), "quux");
    assert!(matches!(repository.locate("foo"), Err(LocateError::NotFound { .. })));
}

#[tokio::test]
async fn lookups_racing_a_refresh_see_a_whole_snapshot() {
    let repository = CommandRepository::new([structured(&["foo"], "bar")]);
    let (events, listener) = repository.listen(8, CancellationToken::new());

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let repository = repository.clone();
            tokio::spawn(async move {
                for _ in 0..100 {
                    let snapshot = repository.snapshot();
                    let count = snapshot.commands.collect_commands(&["foo", "bar"]).len();
                    assert!(count == 1 || count == 2, "unexpected count {count}");
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    events
        .send(RepositoryEvent::Added(vec![structured(&["foo"], "bar")]))
        .await
        .expect("listener running");
    drop(events);
    listener.await.expect("listener exits");
    for reader in readers {
        reader.await.expect("reader finishes");
    }

    assert_eq!(repository.collect_commands(&["foo", "bar"]).len(), 2);
}

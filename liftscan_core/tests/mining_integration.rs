use std::collections::HashSet;
use std::fs;
use std::path::Path;

use camino::Utf8PathBuf;
use git2::{ErrorClass, ErrorCode, IndexAddOption, Repository as GitRepository};
use liftscan_core::annotate::{strip_markers, END_MARKER, START_MARKER};
use liftscan_core::artifacts::ArtifactWriter;
use liftscan_core::history::{GitHistory, HistorySource};
use liftscan_core::limits::{RecordBudget, RecordLimit};
use liftscan_core::miner::{Miner, MinerOptions, ScanOutcome};
use liftscan_core::pool::ScanPool;
use liftscan_core::sink::{read_records, recorded_keys, JsonLinesSink, MemorySink, SharedSink};
use liftscan_core::{Error, Result};
use tempfile::TempDir;

const PREFIX: &str = "//! Arithmetic helpers.\n\npub const LIMIT: u32 = 100;\n\npub fn clamp(value: u32) -> u32 {\n    value.min(LIMIT)\n}\n\n";

const BEFORE: &str = concat!(
    "pub fn total(items: &[u32]) -> u32 {\n",
    "    if items.is_empty() {\n",
    "        return 0;\n",
    "    }\n",
    "    {\n",
    "        let mut sum = 0;\n",
    "        for item in items {\n",
    "            sum += item;\n",
    "        }\n",
    "        sum\n",
    "    }\n",
    "}\n",
);

const AFTER: &str = concat!(
    "fn accumulate(items: &[u32]) -> u32 {\n",
    "    let mut sum = 0;\n",
    "    for item in items {\n",
    "        sum += item;\n",
    "    }\n",
    "    sum\n",
    "}\n",
    "\n",
    "pub fn total(items: &[u32]) -> u32 {\n",
    "    if items.is_empty() {\n",
    "        return 0;\n",
    "    }\n",
    "    accumulate(items)\n",
    "}\n",
);

#[test]
fn mines_extraction_and_writes_artifacts() -> Result<()> {
    let fixture = TempDir::new().expect("tempdir");
    let (pre_commit, post_commit) = extraction_repository(fixture.path(), "src/lib.rs")?;

    let out = TempDir::new().expect("tempdir");
    let out_root = utf8(out.path());
    let records_path = out_root.join("extracts.jsonl");
    let writer = ArtifactWriter::new(out_root.join("annotated"));

    let options = unlimited();
    let budget = RecordBudget::new(None);
    let recorded = HashSet::new();
    let sink = SharedSink::new(JsonLinesSink::open(&records_path)?);
    let miner = Miner::new(&options, &budget, &recorded, &sink).with_artifacts(&writer);

    let history = GitHistory::open(fixture.path())?;
    let (count, outcome) = miner.mine_history("demo", &history)?;
    assert_eq!(count, 1);
    assert_eq!(outcome, ScanOutcome::Completed);
    drop(sink.into_inner()?);

    let records = read_records(&records_path)?;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.repo, "demo");
    assert_eq!(record.function, "accumulate");
    assert_eq!(record.pre_commit, pre_commit);
    assert_eq!(record.post_commit, post_commit);
    assert_eq!(record.pre_file, "src/lib.rs");
    assert_eq!(record.post_file, "src/lib.rs");
    assert_eq!(record.match_pct, 85);
    assert!(!record.generic);
    assert!(!record.is_async);
    assert_eq!(record.author, "test@example.com");
    assert_eq!((record.start_line, record.end_line), (6, 20));

    let post_path = out_root.join(format!(
        "annotated/demo/post_{}__src_lib.rs",
        &post_commit[..10]
    ));
    let post = fs::read_to_string(&post_path).expect("post artifact");
    let lines: Vec<&str> = post.lines().collect();
    let start = lines
        .iter()
        .position(|line| *line == START_MARKER)
        .expect("start marker");
    assert_eq!(lines[start + 1], "fn accumulate(items: &[u32]) -> u32 {");
    assert_eq!(lines[start + 8], END_MARKER);
    assert_eq!(strip_markers(&post), format!("{PREFIX}{AFTER}"));

    let pre_path = out_root.join(format!(
        "annotated/demo/pre_{}__src_lib.rs",
        &pre_commit[..10]
    ));
    let pre = fs::read_to_string(&pre_path).expect("pre artifact");
    assert_eq!(pre.matches(START_MARKER).count(), 1);
    assert_eq!(pre.matches(END_MARKER).count(), 1);
    assert_eq!(strip_markers(&pre), format!("{PREFIX}{BEFORE}"));

    Ok(())
}

#[test]
fn rescan_skips_recorded_changes() -> Result<()> {
    let fixture = TempDir::new().expect("tempdir");
    extraction_repository(fixture.path(), "src/lib.rs")?;
    let out = TempDir::new().expect("tempdir");
    let records_path = utf8(out.path()).join("extracts.jsonl");
    let options = unlimited();

    for expected in [1, 0] {
        let budget = RecordBudget::new(None);
        let recorded = recorded_keys(&records_path)?;
        let sink = SharedSink::new(JsonLinesSink::open(&records_path)?);
        let miner = Miner::new(&options, &budget, &recorded, &sink);
        let (count, _) = miner.mine_history("demo", &GitHistory::open(fixture.path())?)?;
        assert_eq!(count, expected);
    }

    assert_eq!(read_records(&records_path)?.len(), 1);
    Ok(())
}

#[test]
fn other_extensions_are_ignored() -> Result<()> {
    let fixture = TempDir::new().expect("tempdir");
    extraction_repository(fixture.path(), "notes/lib.txt")?;

    let options = unlimited();
    let budget = RecordBudget::new(None);
    let recorded = HashSet::new();
    let sink = SharedSink::new(MemorySink::default());
    let miner = Miner::new(&options, &budget, &recorded, &sink);
    let (count, outcome) = miner.mine_history("demo", &GitHistory::open(fixture.path())?)?;

    assert_eq!((count, outcome), (0, ScanOutcome::Completed));
    Ok(())
}

#[test]
fn empty_repository_completes_without_records() -> Result<()> {
    let fixture = TempDir::new().expect("tempdir");
    GitRepository::init(fixture.path()).map_err(Error::from)?;

    let options = unlimited();
    let budget = RecordBudget::new(None);
    let recorded = HashSet::new();
    let sink = SharedSink::new(MemorySink::default());
    let miner = Miner::new(&options, &budget, &recorded, &sink);
    let history = GitHistory::open(fixture.path())?;

    assert!(history.commits()?.is_empty());
    let (count, outcome) = miner.mine_history("empty", &history)?;
    assert_eq!((count, outcome), (0, ScanOutcome::Completed));
    Ok(())
}

#[test]
fn pool_scans_repositories_into_one_stream() -> Result<()> {
    let fixtures: Vec<TempDir> = (0..3).map(|_| TempDir::new().expect("tempdir")).collect();
    for fixture in &fixtures {
        extraction_repository(fixture.path(), "src/lib.rs")?;
    }

    let options = MinerOptions {
        limit: RecordLimit {
            per_repository: None,
            total: Some(2),
        },
        ..MinerOptions::default()
    };
    let budget = RecordBudget::new(options.limit.total);
    let recorded = HashSet::new();
    let sink = SharedSink::new(MemorySink::default());
    let miner = Miner::new(&options, &budget, &recorded, &sink);

    let pool = ScanPool::new(3)?;
    let results = pool.run(&fixtures, |fixture| {
        let history = GitHistory::open(fixture.path())?;
        let name = fixture
            .path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        miner.mine_history(&name, &history)
    });

    let total: usize = results
        .into_iter()
        .map(|result| result.map(|(count, _)| count))
        .sum::<Result<usize>>()?;
    assert_eq!(total, 2);
    assert_eq!(sink.into_inner()?.records().len(), 2);
    Ok(())
}

#[test]
fn file_at_reads_both_sides() -> Result<()> {
    let fixture = TempDir::new().expect("tempdir");
    let (pre_commit, post_commit) = extraction_repository(fixture.path(), "src/lib.rs")?;
    let history = GitHistory::open(fixture.path())?;

    assert_eq!(
        history.file_at(&pre_commit, "src/lib.rs")?,
        format!("{PREFIX}{BEFORE}")
    );
    assert_eq!(
        history.file_at(&post_commit, "src/lib.rs")?,
        format!("{PREFIX}{AFTER}")
    );
    assert!(history.file_at(&post_commit, "src/missing.rs").is_err());
    Ok(())
}

fn unlimited() -> MinerOptions {
    MinerOptions {
        limit: RecordLimit::unlimited(),
        ..MinerOptions::default()
    }
}

fn extraction_repository(root: &Path, file: &str) -> Result<(String, String)> {
    let repo = GitRepository::init(root).map_err(Error::from)?;
    write_file(&root.join("README.md"), "demo\n");
    commit_all(&repo, "initial")?;

    write_file(&root.join(file), &format!("{PREFIX}{BEFORE}"));
    let pre = commit_all(&repo, "add total")?;

    write_file(&root.join(file), &format!("{PREFIX}{AFTER}"));
    let post = commit_all(&repo, "extract accumulate")?;
    Ok((pre, post))
}

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create dir");
    }
    fs::write(path, contents).expect("write file");
}

fn commit_all(repo: &GitRepository, message: &str) -> Result<String> {
    let mut index = repo.index().map_err(Error::from)?;
    index
        .add_all(["*"], IndexAddOption::DEFAULT, None)
        .map_err(Error::from)?;
    index.write().map_err(Error::from)?;
    let tree_id = index.write_tree().map_err(Error::from)?;
    let tree = repo.find_tree(tree_id).map_err(Error::from)?;
    let signature = git2::Signature::now("Test User", "test@example.com").map_err(Error::from)?;

    let parents = match repo.head() {
        Ok(head) => vec![head.peel_to_commit().map_err(Error::from)?],
        Err(err)
            if matches!(
                (err.class(), err.code()),
                (
                    ErrorClass::Reference,
                    ErrorCode::NotFound | ErrorCode::UnbornBranch
                )
            ) =>
        {
            Vec::new()
        }
        Err(err) => return Err(Error::from(err)),
    };

    let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
    let oid = repo
        .commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parent_refs,
        )
        .map_err(Error::from)?;
    Ok(oid.to_string())
}

fn utf8(path: &Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).expect("utf-8 temp path")
}

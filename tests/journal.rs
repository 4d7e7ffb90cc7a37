use anyhow::Result;
use opjournal::{JournalError, Operation, Operator, RenameFile, RenameInFile, Step};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// File name -> contents for every file directly inside `dir`.
fn snapshot(dir: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut files = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.insert(
                entry.file_name().to_string_lossy().into_owned(),
                fs::read(entry.path())?,
            );
        }
    }
    Ok(files)
}

fn seed_album(dir: &Path) -> Result<()> {
    fs::write(dir.join("a.cue"), "PERFORMER \"Artist A\"\nFILE \"01.flac\" WAVE\nFILE \"02.flac\" WAVE\n")?;
    fs::write(dir.join("01.flac"), "track one")?;
    fs::write(dir.join("02.flac"), "track two")?;
    Ok(())
}

fn album_operator(state: &Path, music: &Path) -> Result<Operator> {
    let mut operator = Operator::new(state, "album");
    operator.add_operation(RenameInFile::new(music.join("a.cue"), "Artist A", "Artist B"))?;
    operator.add_operation(RenameFile::new(music.join("a.cue"), music.join("b.cue")))?;
    operator.add_operation(RenameFile::new(music.join("01.flac"), music.join("01 - Intro.flac")))?;
    operator.add_operation(RenameInFile::new(music.join("b.cue"), "01.flac", "01 - Intro.flac"))?;
    operator.add_operation(RenameFile::new(music.join("02.flac"), music.join("02 - Outro.flac")))?;
    Ok(operator)
}

/// Final state of an uninterrupted run.
fn reference_run() -> Result<BTreeMap<String, Vec<u8>>> {
    let dir = tempdir()?;
    let music = dir.path().join("music");
    fs::create_dir(&music)?;
    seed_album(&music)?;
    let mut operator = album_operator(&dir.path().join("state"), &music)?;
    operator.save()?;
    assert_eq!(operator.run()?, 5);
    snapshot(&music)
}

fn workspace() -> Result<(tempfile::TempDir, PathBuf, PathBuf)> {
    let dir = tempdir()?;
    let music = dir.path().join("music");
    let state = dir.path().join("state");
    fs::create_dir(&music)?;
    seed_album(&music)?;
    Ok((dir, music, state))
}

#[test]
fn test_resume_after_every_step() -> Result<()> {
    let expected = reference_run()?;
    assert!(expected.contains_key("b.cue"));
    assert!(expected.contains_key("02 - Outro.flac"));

    for k in 0..=5 {
        let (_dir, music, state) = workspace()?;
        {
            let mut operator = album_operator(&state, &music)?;
            operator.save()?;
            for _ in 0..k {
                operator.next()?;
            }
        }

        let mut resumed = Operator::new(&state, "album");
        resumed.load()?;
        assert_eq!(resumed.completed().len(), k);
        resumed.run()?;
        assert_eq!(snapshot(&music)?, expected, "crash after {k} steps");
    }
    Ok(())
}

#[test]
fn test_resume_after_crash_mid_step() -> Result<()> {
    let expected = reference_run()?;

    for k in 0..5 {
        let (_dir, music, state) = workspace()?;
        {
            let mut operator = album_operator(&state, &music)?;
            operator.save()?;
            for _ in 0..k {
                operator.next()?;
            }
            // Step k applied its change, progress was never written.
            operator.pending()[0].execute()?;
        }

        let mut resumed = Operator::new(&state, "album");
        resumed.load()?;
        assert!(resumed.is_resuming());
        assert_eq!(resumed.next()?, Step::Reexecuted { index: k });
        resumed.run()?;
        assert_eq!(snapshot(&music)?, expected, "crash during step {k}");
    }
    Ok(())
}

#[test]
fn test_resume_with_resupplied_plan() -> Result<()> {
    let (_dir, music, state) = workspace()?;
    let mut first = album_operator(&state, &music)?;
    first.save()?;
    first.next()?;
    first.next()?;
    drop(first);

    let mut second = album_operator(&state, &music)?;
    second.load()?;
    assert_eq!(second.completed().len(), 2);
    assert_eq!(second.run()?, 3);
    assert_eq!(snapshot(&music)?, reference_run()?);
    Ok(())
}

#[test]
fn test_corrupted_progress_is_detected() -> Result<()> {
    let (_dir, music, state) = workspace()?;
    let mut operator = album_operator(&state, &music)?;
    operator.save()?;
    operator.next()?;
    let progress_path = operator.progress_path();
    drop(operator);

    let mut progress = fs::read(&progress_path)?;
    progress[0] = b'X';
    fs::write(&progress_path, &progress)?;

    let before = snapshot(&music)?;
    let mut loaded = Operator::new(&state, "album");
    let err = loaded.load().unwrap_err();
    assert!(matches!(err, JournalError::Corruption { line: 1, .. }), "{err}");
    assert_eq!(snapshot(&music)?, before);
    Ok(())
}

#[test]
fn test_completed_stays_a_prefix() -> Result<()> {
    let dir = tempdir()?;
    let music = dir.path();
    fs::write(music.join("a.flac"), "a")?;
    fs::write(music.join("c.flac"), "c")?;

    let mut operator = Operator::new(music.join("state"), "prefix");
    operator.add_operation(RenameFile::new(music.join("a.flac"), music.join("A.flac")))?;
    operator.add_operation(RenameFile::new(music.join("b.flac"), music.join("B.flac")))?;
    operator.add_operation(RenameFile::new(music.join("c.flac"), music.join("C.flac")))?;
    operator.save()?;

    let check = |operator: &Operator| {
        let completed = operator.completed();
        assert!(completed.len() <= operator.planned().len());
        assert_eq!(completed, &operator.planned()[..completed.len()]);
    };

    operator.next()?;
    check(&operator);
    for _ in 0..3 {
        assert!(operator.next().is_err());
        check(&operator);
        assert_eq!(operator.completed().len(), 1);
    }

    fs::write(music.join("b.flac"), "b")?;
    assert_eq!(operator.next()?, Step::Executed { index: 1 });
    check(&operator);
    assert_eq!(operator.next()?, Step::Executed { index: 2 });
    check(&operator);
    assert_eq!(operator.next()?, Step::Complete);
    check(&operator);
    Ok(())
}

#[test]
fn test_cue_rename_scenario() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    let a = root.join("a.cue");
    let b = root.join("b.cue");
    fs::write(&a, "Artist A - Track")?;

    let mut operator = Operator::new(root.join("state"), "scenario");
    operator.add_operation(RenameInFile::new(&a, "Artist A", "Artist B"))?;
    operator.add_operation(RenameFile::new(&a, &b))?;
    operator.save()?;

    operator.next()?;
    operator.next()?;

    assert!(!a.exists());
    assert_eq!(fs::read_to_string(&b)?, "Artist B - Track");

    let plan = fs::read_to_string(operator.plan_path())?;
    let progress = fs::read_to_string(operator.progress_path())?;
    assert_eq!(progress.lines().count(), 2);
    assert_eq!(progress, plan);
    assert_eq!(
        plan,
        format!(
            "RenameInFile \"{}\" \"Artist A\" \"Artist B\"\nRenameFile \"{}\" \"{}\"\n",
            a.display(),
            a.display(),
            b.display()
        )
    );
    Ok(())
}

#[test]
fn test_unencodable_operation_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let mut operator = Operator::new(dir.path(), "quotes");
    let err = operator
        .add_operation(RenameInFile::new("a.cue", "TITLE \"x\"", "TITLE \"y\""))
        .unwrap_err();
    assert!(matches!(err, JournalError::Unencodable { .. }));
    assert!(operator.planned().is_empty());
    Ok(())
}

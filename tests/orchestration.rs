//! Orchestration behaviour observed through test-double backends.

mod common;

use std::cell::RefCell;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use common::touch;
use idxcheck::{
    CHERT_MARKER, ChangesReport, CheckError, CheckOptions, Checker, ChertBackend, ChertOpen,
    DocId, DocLenAllocator, DocLenSlot, DocLens, FLINT_MARKER, GLASS_MARKER, GlassBackend,
    GlassVersionInfo, Output, ReserveFailure, Revision, SkipReason, TableCheckRequest,
    TableChecker,
};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Call {
    name: String,
    path: PathBuf,
    trusted: Option<Option<Revision>>,
    options: CheckOptions,
    last_docid: DocId,
    doclens: usize,
    skip: Option<SkipReason>,
    detached: bool,
}

#[derive(Default)]
struct Log {
    calls: Vec<Call>,
    changes: Vec<PathBuf>,
    created: usize,
}

/// Backend double that records every call and returns scripted results.
#[derive(Clone, Default)]
struct Recorder {
    log: Rc<RefCell<Log>>,
    open_fails: bool,
    version_fails: bool,
    version_io_error: bool,
    errors_per_table: usize,
    revision: Revision,
    last_docid: DocId,
}

impl Recorder {
    fn new(revision: Revision, last_docid: DocId) -> Self {
        Self {
            revision,
            last_docid,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.log.borrow().calls.clone()
    }

    fn names(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.name).collect()
    }
}

impl TableChecker for Recorder {
    fn check_table(
        &self,
        request: TableCheckRequest<'_>,
        doclens: &mut DocLens,
        out: &mut Output<'_>,
    ) -> usize {
        out.line(format_args!("checked {}", request.name));
        self.log.borrow_mut().calls.push(Call {
            name: request.name.to_string(),
            path: request.path.to_path_buf(),
            trusted: request.revision.map(|context| context.trusted),
            options: request.options,
            last_docid: request.last_docid,
            doclens: std::ptr::from_ref::<DocLens>(doclens) as usize,
            skip: doclens.skip_reason(),
            detached: doclens.is_detached(),
        });
        self.errors_per_table
    }
}

impl ChertBackend for Recorder {
    fn open(&self, _dir: &Path) -> idxcheck::Result<ChertOpen> {
        if self.open_fails {
            return Err(CheckError::Database {
                reason: "no root block".into(),
            });
        }
        Ok(ChertOpen {
            last_docid: self.last_docid,
            revision: self.revision,
        })
    }

    fn read_and_check_version(&self, _dir: &Path) -> idxcheck::Result<()> {
        if self.version_io_error {
            return Err(CheckError::Io(std::io::Error::other("disk gone")));
        }
        if self.version_fails {
            return Err(CheckError::Database {
                reason: "bad version".into(),
            });
        }
        Ok(())
    }

    fn create_version(&self, _dir: &Path) -> idxcheck::Result<()> {
        self.log.borrow_mut().created += 1;
        Ok(())
    }
}

impl GlassBackend for Recorder {
    fn open(&self, _dir: &Path) -> idxcheck::Result<()> {
        if self.open_fails {
            return Err(CheckError::Database {
                reason: "no root block".into(),
            });
        }
        Ok(())
    }

    fn read_version(&self, _dir: &Path) -> idxcheck::Result<GlassVersionInfo> {
        if self.version_fails {
            return Err(CheckError::Database {
                reason: "bad version".into(),
            });
        }
        Ok(GlassVersionInfo {
            revision: self.revision,
            last_docid: self.last_docid,
        })
    }

    fn check_changes(&self, path: &Path) -> ChangesReport {
        self.log.borrow_mut().changes.push(path.to_path_buf());
        ChangesReport {
            errors: 1,
            diagnostics: vec![format!("looked at {}", path.display())],
        }
    }
}

struct Refuse(ReserveFailure);

impl DocLenAllocator for Refuse {
    fn reserve(&self, _slots: &mut Vec<DocLenSlot>, _count: usize) -> Result<(), ReserveFailure> {
        Err(self.0)
    }
}

struct Untouchable;

impl DocLenAllocator for Untouchable {
    fn reserve(&self, _slots: &mut Vec<DocLenSlot>, _count: usize) -> Result<(), ReserveFailure> {
        panic!("allocator must not be consulted");
    }
}

fn chert_dir(tables: &[&str]) -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    touch(&dir.path().join(CHERT_MARKER));
    for table in tables {
        touch(&dir.path().join(format!("{table}.DB")));
    }
    dir
}

fn glass_dir() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    touch(&dir.path().join(GLASS_MARKER));
    dir
}

fn capture(checker: &Checker, path: &Path, options: CheckOptions) -> (idxcheck::Result<usize>, String) {
    let mut buf = Vec::new();
    let result = {
        let sink: &mut dyn Write = &mut buf;
        checker.check(path, options, Some(sink))
    };
    (result, String::from_utf8(buf).expect("utf8"))
}

#[test]
fn chert_tables_in_order_with_lazy_gate() {
    let dir = chert_dir(&["record", "postlist", "position"]);
    let backend = Recorder::new(7, 20);
    let checker = Checker::new().with_chert(backend.clone());
    let (result, text) = capture(&checker, dir.path(), CheckOptions::empty());

    assert_eq!(result.expect("check"), 0);
    assert_eq!(backend.names(), ["record", "postlist", "position"]);
    assert!(text.contains("termlist:\nNot present.\n\n"));
    assert!(text.contains("spelling:\nLazily created, and not yet used.\n\n"));
    assert!(text.contains("synonym:\nLazily created, and not yet used.\n\n"));

    let calls = backend.calls();
    assert_eq!(calls[0].path, dir.path().join("record"));
    assert!(calls.iter().all(|call| call.trusted == Some(Some(7))));
    assert!(calls.iter().all(|call| call.last_docid == 20));
}

#[test]
fn mandatory_tables_are_checked_even_when_missing() {
    let dir = chert_dir(&[]);
    let backend = Recorder::new(1, 1);
    let checker = Checker::new().with_chert(backend.clone());
    checker
        .check(dir.path(), CheckOptions::empty(), None)
        .expect("check");
    assert_eq!(backend.names(), ["record", "postlist"]);
}

#[test]
fn one_doclens_instance_flows_from_termlist_to_postlist() {
    let dir = chert_dir(&["record", "termlist", "postlist"]);
    let backend = Recorder::new(3, 50);
    let checker = Checker::new().with_chert(backend.clone());
    checker
        .check(dir.path(), CheckOptions::empty(), None)
        .expect("check");

    let calls = backend.calls();
    let termlist = calls.iter().find(|c| c.name == "termlist").expect("termlist");
    let postlist = calls.iter().find(|c| c.name == "postlist").expect("postlist");
    assert_eq!(termlist.doclens, postlist.doclens);
    assert!(!termlist.detached);
    assert_eq!(termlist.skip, None);
}

#[test]
fn chert_open_failure_is_counted_and_checking_continues() {
    let dir = chert_dir(&["record", "termlist", "postlist"]);
    let backend = Recorder {
        open_fails: true,
        ..Recorder::new(9, 9)
    };
    let checker = Checker::new()
        .with_chert(backend.clone())
        .with_allocator(Untouchable);
    let (result, text) = capture(&checker, dir.path(), CheckOptions::empty());

    assert_eq!(result.expect("check"), 1);
    assert!(text.starts_with(
        "Database couldn't be opened for reading: Database error: no root block\nContinuing check anyway\n"
    ));
    assert!(!text.contains("1GB"), "{text}");

    let calls = backend.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|call| call.last_docid == DocId::MAX));
    assert!(
        calls
            .iter()
            .all(|call| call.skip == Some(SkipReason::UnknownLastDocid))
    );
    assert_eq!(calls[0].trusted, Some(None));
}

#[test]
fn fix_recreates_version_only_when_tables_are_clean() {
    let dir = chert_dir(&["record", "postlist"]);

    let clean = Recorder {
        version_fails: true,
        ..Recorder::new(2, 2)
    };
    Checker::new()
        .with_chert(clean.clone())
        .check(dir.path(), CheckOptions::FIX, None)
        .expect("check");
    assert_eq!(clean.log.borrow().created, 1);

    let without_fix = Recorder {
        version_fails: true,
        ..Recorder::new(2, 2)
    };
    Checker::new()
        .with_chert(without_fix.clone())
        .check(dir.path(), CheckOptions::empty(), None)
        .expect("check");
    assert_eq!(without_fix.log.borrow().created, 0);

    let broken = Recorder {
        version_fails: true,
        errors_per_table: 1,
        ..Recorder::new(2, 2)
    };
    let errors = Checker::new()
        .with_chert(broken.clone())
        .check(dir.path(), CheckOptions::FIX, None)
        .expect("check");
    assert_eq!(errors, 2);
    assert_eq!(broken.log.borrow().created, 0);

    let sound = Recorder::new(2, 2);
    Checker::new()
        .with_chert(sound.clone())
        .check(dir.path(), CheckOptions::FIX, None)
        .expect("check");
    assert_eq!(sound.log.borrow().created, 0);
}

#[test]
fn fix_does_not_mask_non_database_errors() {
    let dir = chert_dir(&["record", "postlist"]);
    let backend = Recorder {
        version_io_error: true,
        ..Recorder::new(2, 2)
    };
    let err = Checker::new()
        .with_chert(backend.clone())
        .check(dir.path(), CheckOptions::FIX, None)
        .expect_err("io error propagates");
    assert!(matches!(err, CheckError::Io(_)));
    assert_eq!(backend.log.borrow().created, 0);
}

#[test]
fn glass_changes_are_checked_newest_first() {
    let dir = glass_dir();
    for name in ["changes1", "changes3", "changes5", "changes7", "changes03", "changesX"] {
        touch(&dir.path().join(name));
    }
    let backend = Recorder::new(5, 10);
    let checker = Checker::new().with_glass(backend.clone());
    let (result, text) = capture(&checker, dir.path(), CheckOptions::empty());

    // one error per changes file from the double
    assert_eq!(result.expect("check"), 3);
    let seen: Vec<PathBuf> = backend.log.borrow().changes.clone();
    assert_eq!(
        seen,
        vec![
            dir.path().join("changes5"),
            dir.path().join("changes3"),
            dir.path().join("changes1"),
        ]
    );
    assert!(text.find("changes5").expect("5") < text.find("changes1").expect("1"));
}

#[test]
fn glass_tables_are_all_delegated() {
    let dir = glass_dir();
    let backend = Recorder::new(4, 6);
    let checker = Checker::new().with_glass(backend.clone());
    checker
        .check(dir.path(), CheckOptions::empty(), None)
        .expect("check");
    assert_eq!(
        backend.names(),
        ["docdata", "termlist", "postlist", "position", "spelling", "synonym"]
    );
    let calls = backend.calls();
    assert!(calls.iter().all(|call| call.trusted == Some(Some(4))));
    assert!(calls.iter().all(|call| call.last_docid == 6));
    assert_eq!(calls[1].doclens, calls[2].doclens);
}

#[test]
fn glass_open_failure_counts_once_but_version_failure_is_fatal() {
    let dir = glass_dir();
    let unopenable = Recorder {
        open_fails: true,
        ..Recorder::new(1, 1)
    };
    let (result, text) = capture(
        &Checker::new().with_glass(unopenable.clone()),
        dir.path(),
        CheckOptions::empty(),
    );
    assert_eq!(result.expect("check"), 1);
    assert!(text.contains("Continuing check anyway"));
    assert_eq!(unopenable.names().len(), 6);

    let no_version = Recorder {
        version_fails: true,
        ..Recorder::new(1, 1)
    };
    let err = Checker::new()
        .with_glass(no_version.clone())
        .check(dir.path(), CheckOptions::empty(), None)
        .expect_err("fatal");
    assert!(err.is_database_error());
    assert!(no_version.calls().is_empty());
}

#[test]
fn allocator_refusal_reaches_the_table_checks() {
    let dir = chert_dir(&["record", "termlist", "postlist"]);
    let backend = Recorder::new(1, 100);
    let checker = Checker::new()
        .with_chert(backend.clone())
        .with_allocator(Refuse(ReserveFailure::CapacityOverflow));
    let (result, text) = capture(&checker, dir.path(), CheckOptions::empty());
    assert_eq!(result.expect("check"), 0);
    assert!(text.starts_with("Couldn't allocate enough elements"));
    assert!(
        backend
            .calls()
            .iter()
            .all(|call| call.skip == Some(SkipReason::TooManyElements))
    );
}

#[test]
fn single_table_gets_no_context() {
    let dir = TempDir::new().expect("tempdir");
    touch(&dir.path().join("PostList.DB"));
    let backend = Recorder::new(1, 1);
    let checker = Checker::new().with_chert(backend.clone());
    checker
        .check(dir.path().join("PostList.DB"), CheckOptions::empty(), None)
        .expect("check");

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name, "postlist");
    assert_eq!(calls[0].path, dir.path().join("PostList"));
    assert_eq!(calls[0].trusted, None);
    assert_eq!(calls[0].last_docid, DocId::MAX);
    assert!(calls[0].detached);
}

#[test]
fn presentation_options_are_dropped_without_a_sink() {
    let dir = chert_dir(&["record", "postlist"]);
    let backend = Recorder::new(1, 1);
    let checker = Checker::new().with_chert(backend.clone());
    checker
        .check(
            dir.path(),
            CheckOptions::FIX | CheckOptions::FULL_TREE | CheckOptions::SHOW_STATS,
            None,
        )
        .expect("check");
    assert!(
        backend
            .calls()
            .iter()
            .all(|call| call.options == CheckOptions::FIX)
    );

    let (result, _) = capture(&checker, dir.path(), CheckOptions::FULL_TREE);
    result.expect("check");
    assert_eq!(backend.calls().last().expect("call").options, CheckOptions::FULL_TREE);
}

#[test]
fn missing_backends_are_reported() {
    let chert = chert_dir(&[]);
    assert!(matches!(
        Checker::without_backends().check(chert.path(), CheckOptions::empty(), None),
        Err(CheckError::ChertUnavailable)
    ));
    assert_eq!(
        CheckError::ChertUnavailable.to_string(),
        "Chert database support isn't enabled"
    );

    let glass = glass_dir();
    assert!(matches!(
        Checker::without_backends().check(glass.path(), CheckOptions::empty(), None),
        Err(CheckError::GlassUnavailable)
    ));

    let table = TempDir::new().expect("tempdir");
    touch(&table.path().join("termlist.glass"));
    assert!(matches!(
        Checker::without_backends().check(table.path().join("termlist"), CheckOptions::empty(), None),
        Err(CheckError::GlassUnavailable)
    ));

    // retired formats are still reported first
    let flint = TempDir::new().expect("tempdir");
    touch(&flint.path().join(FLINT_MARKER));
    assert!(matches!(
        Checker::without_backends().check(flint.path(), CheckOptions::empty(), None),
        Err(CheckError::RetiredFormat(_))
    ));
}

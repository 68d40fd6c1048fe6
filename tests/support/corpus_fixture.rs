use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use theorybench::infra::corpus::CorpusLayout;

/// Temporary corpus tree removed on drop. Paths passed to `write` are
/// relative to the fixture root, so tests lay out `data/...` and `outputs/...`
/// exactly as a real checkout would.
pub(crate) struct CorpusFixture {
    root: PathBuf,
}

impl CorpusFixture {
    pub(crate) fn new(prefix: &str) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock should be after UNIX_EPOCH")
            .as_nanos();
        let root = std::env::temp_dir().join(format!("theorybench-{prefix}-{nanos}-{id}"));
        fs::create_dir_all(&root).expect("test fixture root must be creatable");
        Self { root }
    }

    pub(crate) fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("test fixture directory must be creatable");
        }
        fs::write(&path, contents).expect("test fixture file must be writable");
        path
    }

    pub(crate) fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub(crate) fn layout(&self) -> CorpusLayout {
        CorpusLayout::new(&self.root.join("data"), &self.root.join("outputs"))
    }
}

impl Drop for CorpusFixture {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

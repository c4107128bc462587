//! Optional diagnostic sink shared by every stage of a check.

use std::fmt;
use std::io::{self, Write};

/// Where free-text diagnostics go. Without a sink every write is dropped, so
/// callers never need to branch on whether anyone is listening.
pub struct Output<'a> {
    sink: Option<&'a mut dyn Write>,
    failed: Option<io::Error>,
}

impl<'a> Output<'a> {
    #[must_use]
    pub fn new(sink: Option<&'a mut dyn Write>) -> Self {
        Self { sink, failed: None }
    }

    /// An output that discards everything.
    #[must_use]
    pub fn none() -> Self {
        Self {
            sink: None,
            failed: None,
        }
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    /// Write `args` followed by a newline.
    ///
    /// A failing sink is detached after the first error so the check runs to
    /// completion; [`Output::finish`] hands that error back.
    pub fn line(&mut self, args: fmt::Arguments<'_>) {
        let written = match self.sink.as_mut() {
            Some(sink) => sink.write_fmt(args).and_then(|()| sink.write_all(b"\n")),
            None => return,
        };
        if let Err(err) = written {
            tracing::warn!(error = %err, "diagnostic sink write failed; detaching");
            self.sink = None;
            self.failed = Some(err);
        }
    }

    /// Flush the sink and report the first write failure, if any.
    pub fn finish(&mut self) -> io::Result<()> {
        if let Some(err) = self.failed.take() {
            return Err(err);
        }
        match self.sink.as_mut() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Output<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("attached", &self.is_attached())
            .finish()
    }
}

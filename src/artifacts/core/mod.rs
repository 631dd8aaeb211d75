//! Terminal output shared by the command line front end

use derive_new::new;
use is_terminal::IsTerminal;
use minus::Pager;
use std::io::{self, Write};

/// Set to any value to print long output straight to stdout
pub const NO_PAGER_ENV: &str = "NO_PAGER";

/// `Write` adapter feeding a `minus` pager
#[derive(new)]
pub struct PagerWriter {
    pager: Pager,
}

impl Write for PagerWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text =
            std::str::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.pager.push_str(text).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Destination for text that may be long, such as a log
pub enum Output {
    Stdout(io::Stdout),
    Paged(PagerWriter),
}

impl Output {
    /// The pager on an interactive terminal unless `NO_PAGER` is set, stdout otherwise
    pub fn for_long_text() -> Self {
        let stdout = io::stdout();
        if stdout.is_terminal() && std::env::var_os(NO_PAGER_ENV).is_none() {
            Output::Paged(PagerWriter::new(Pager::new()))
        } else {
            Output::Stdout(stdout)
        }
    }

    pub fn stdout() -> Self {
        Output::Stdout(io::stdout())
    }

    /// Flush stdout, or hand the buffered text to the pager and wait for it to close
    pub fn finish(self) -> anyhow::Result<()> {
        match self {
            Output::Stdout(mut stdout) => Ok(stdout.flush()?),
            Output::Paged(writer) => Ok(minus::page_all(writer.pager)?),
        }
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout(stdout) => stdout.write(buf),
            Output::Paged(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout(stdout) => stdout.flush(),
            Output::Paged(writer) => writer.flush(),
        }
    }
}

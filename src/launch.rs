//! Parallel-for over independent elements. Every operator already splits its output
//! into disjoint rayon chunks; the launcher only decides which pool runs them.

use anyhow::{Context, Result};

pub struct Launcher {
    pool: Option<rayon::ThreadPool>,
    threads: usize,
}

impl Launcher {
    /// `threads == 0` uses the global rayon pool.
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Ok(Self::global());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .with_context(|| format!("build {}-thread pool", threads))?;
        Ok(Self { pool: Some(pool), threads })
    }

    pub fn global() -> Self { Self { pool: None, threads: rayon::current_num_threads() } }

    /// Threads from `QUANTREF_THREADS` when set, else the global pool.
    pub fn from_env() -> Result<Self> {
        Self::from_setting(std::env::var("QUANTREF_THREADS").ok().as_deref())
    }

    /// A thread count given as text; `None` means unset. Unparsable values are an error.
    pub fn from_setting(value: Option<&str>) -> Result<Self> {
        match value {
            Some(s) => {
                let n = s.trim().parse::<usize>().with_context(|| format!("QUANTREF_THREADS={:?} is not a thread count", s))?;
                Self::new(n)
            }
            None => Ok(Self::global()),
        }
    }

    pub fn threads(&self) -> usize { self.threads }

    pub fn install<R: Send, F: FnOnce() -> R + Send>(&self, f: F) -> R {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }
}

impl Default for Launcher {
    fn default() -> Self { Self::global() }
}

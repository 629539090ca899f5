use anyhow::{bail, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use quantref::cases::{load_cases, run_case, Verdict};
use quantref::{Dispatcher, Launcher};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "quantref", version, about = "Check JSON-lines test vectors against the reference arithmetic")]
struct Args {
    /// Case file (one JSON object per line)
    #[arg(long)]
    cases: PathBuf,

    /// Worker threads (0 = rayon default; QUANTREF_THREADS overrides when unset)
    #[arg(long)]
    threads: Option<usize>,

    /// Print every mismatching element instead of the first few
    #[arg(long)]
    verbose: bool,

    /// Hide the progress bar
    #[arg(long)]
    quiet: bool,
}

fn describe(v: &Verdict, verbose: bool) -> String {
    match v {
        Verdict::Pass => "ok".to_string(),
        Verdict::Mismatch(bad) => {
            let shown = if verbose { bad.len() } else { bad.len().min(4) };
            let items: Vec<String> = bad[..shown].iter().map(|(i, e, a)| format!("[{}] want {} got {}", i, e, a)).collect();
            format!("{} mismatches: {}", bad.len(), items.join(", "))
        }
        Verdict::LengthMismatch { expected, actual } => format!("expected {} outputs, got {}", expected, actual),
        Verdict::UnexpectedError(e) => format!("rejected: {}", e),
        Verdict::MissingError => "expected rejection, call succeeded".to_string(),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let launcher = match args.threads {
        Some(n) => Launcher::new(n)?,
        None => Launcher::from_env()?,
    };
    info!("running on {} threads", launcher.threads());
    let dispatcher = Dispatcher::new(launcher);

    let cases = load_cases(&args.cases)?;
    info!("loaded {} cases from {}", cases.len(), args.cases.display());

    let pb = if args.quiet { ProgressBar::hidden() } else { ProgressBar::new(cases.len() as u64) };
    pb.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")?);

    let t0 = Instant::now();
    let mut failed = 0usize;
    for case in &cases {
        pb.set_message(case.name.clone());
        let verdict = run_case(&dispatcher, case);
        if !verdict.passed() {
            failed += 1;
            pb.suspend(|| println!("FAIL {}: {}", case.name, describe(&verdict, args.verbose)));
            warn!("case {} failed", case.name);
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!("cases={} passed={} failed={} elapsed={:.3}s", cases.len(), cases.len() - failed, failed, t0.elapsed().as_secs_f64());
    if failed > 0 {
        bail!("{} of {} cases failed", failed, cases.len());
    }
    Ok(())
}

use crate::component::{BatchExtractor, SingleExtractor};
use crate::config::Config;
use crate::pause;
use crate::signal::ShutdownFlag;
use anyhow::Result;
use console::{Term, style};

pub fn run_single_extractor(term: &Term, shutdown_signal: &ShutdownFlag) -> Result<()> {
    let config = Config::new()?;
    let mut extractor = SingleExtractor::new(config, shutdown_signal.clone());

    if let Err(e) = extractor.run() {
        eprintln!("{} {}", style("錯誤:").red().bold(), e);
    }

    shutdown_signal.clear();
    pause(term)?;
    Ok(())
}

pub fn run_batch_extractor(term: &Term, shutdown_signal: &ShutdownFlag) -> Result<()> {
    let config = Config::new()?;
    let mut extractor = BatchExtractor::new(config, shutdown_signal.clone());

    if let Err(e) = extractor.run() {
        eprintln!("{} {}", style("錯誤:").red().bold(), e);
    }

    // 批次元件自己消化最後的 Enter，不再額外 pause
    shutdown_signal.clear();
    Ok(())
}

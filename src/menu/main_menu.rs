use crate::config::{Config, save_settings};
use crate::engine::{ImageFormat, ProgressProtocol};
use crate::menu::handlers::{run_batch_extractor, run_single_extractor};
use crate::signal::ShutdownFlag;
use anyhow::Result;
use console::{Term, style};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};

pub fn show_main_menu(
    term: &Term,
    shutdown_signal: &ShutdownFlag,
    config: &mut Config,
) -> Result<bool> {
    term.clear_screen()?;

    println!("{}", style("=== 影片幀擷取工具 ===").cyan().bold());
    println!("{}", style("按 ESC 離開").dim());

    let options = vec!["單一影片幀擷取", "批次幀擷取", "設定", "離開"];

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("請選擇功能")
        .items(&options)
        .default(0)
        .interact_on_opt(term)?;

    match selection {
        Some(0) => {
            run_single_extractor(term, shutdown_signal)?;
            Ok(true)
        }
        Some(1) => {
            run_batch_extractor(term, shutdown_signal)?;
            Ok(true)
        }
        Some(2) => {
            show_settings_menu(term, config)?;
            Ok(true)
        }
        Some(3) => Ok(false),
        None => Ok(false), // ESC pressed - exit
        _ => unreachable!(),
    }
}

/// 設定選單
fn show_settings_menu(term: &Term, config: &mut Config) -> Result<()> {
    loop {
        term.clear_screen()?;

        println!("{}", style("=== 設定 ===").cyan().bold());
        println!("{}", style("按 ESC 返回").dim());
        println!(
            "\n{} 格式 {}、品質 {}、執行緒 {}、進度來源 {}",
            style("目前設定:").dim(),
            config.settings.image_format,
            config.settings.jpeg_quality,
            config.settings.ffmpeg_threads,
            config.settings.progress_protocol
        );
        println!();

        let options = vec![
            "預設圖片格式",
            "預設壓縮品質",
            "ffmpeg 執行緒數",
            "進度回報方式",
            "返回",
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("請選擇項目")
            .items(&options)
            .default(0)
            .interact_on_opt(term)?;

        match selection {
            Some(0) => show_format_menu(term, config)?,
            Some(1) => show_quality_menu(config)?,
            Some(2) => show_threads_menu(config)?,
            Some(3) => show_protocol_menu(term, config)?,
            Some(4) | None => break, // ESC or back
            _ => unreachable!(),
        }
    }

    Ok(())
}

fn show_format_menu(term: &Term, config: &mut Config) -> Result<()> {
    let formats = [ImageFormat::Png, ImageFormat::Jpeg];
    let items: Vec<String> = formats.iter().map(ToString::to_string).collect();
    let default_index = formats
        .iter()
        .position(|&f| f == config.settings.image_format)
        .unwrap_or(0);

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("預設圖片格式")
        .items(&items)
        .default(default_index)
        .interact_on_opt(term)?;

    // ESC pressed - return without saving
    let Some(selection) = selection else {
        return Ok(());
    };

    if formats[selection] != config.settings.image_format {
        config.settings.image_format = formats[selection];
        save_settings(&config.settings)?;
        println!("\n{} {}", style("已儲存:").green(), formats[selection]);
        std::thread::sleep(std::time::Duration::from_secs(1));
    }

    Ok(())
}

fn show_quality_menu(config: &mut Config) -> Result<()> {
    let quality: u8 = Input::new()
        .with_prompt("預設壓縮品質 (1-100)")
        .default(config.settings.jpeg_quality)
        .validate_with(|q: &u8| {
            if (1..=100).contains(q) {
                Ok(())
            } else {
                Err("品質必須在 1 到 100 之間")
            }
        })
        .interact_text()?;

    if quality != config.settings.jpeg_quality {
        config.settings.jpeg_quality = quality;
        save_settings(&config.settings)?;
        println!("\n{} {}", style("已儲存:").green(), quality);
        std::thread::sleep(std::time::Duration::from_secs(1));
    }

    Ok(())
}

fn show_threads_menu(config: &mut Config) -> Result<()> {
    let threads: u32 = Input::new()
        .with_prompt("ffmpeg 執行緒數（0 表示交給 ffmpeg 決定）")
        .default(config.settings.ffmpeg_threads)
        .validate_with(|n: &u32| {
            if *n <= 64 {
                Ok(())
            } else {
                Err("執行緒數必須在 0 到 64 之間")
            }
        })
        .interact_text()?;

    if threads != config.settings.ffmpeg_threads {
        config.settings.ffmpeg_threads = threads;
        save_settings(&config.settings)?;
        println!("\n{} {}", style("已儲存:").green(), threads);
        std::thread::sleep(std::time::Duration::from_secs(1));
    }

    Ok(())
}

fn show_protocol_menu(term: &Term, config: &mut Config) -> Result<()> {
    let protocols = [ProgressProtocol::KeyValue, ProgressProtocol::LogScrape];
    let items: Vec<String> = protocols.iter().map(ToString::to_string).collect();
    let default_index = protocols
        .iter()
        .position(|&p| p == config.settings.progress_protocol)
        .unwrap_or(0);

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("進度回報方式")
        .items(&items)
        .default(default_index)
        .interact_on_opt(term)?;

    let Some(selection) = selection else {
        return Ok(());
    };

    if protocols[selection] != config.settings.progress_protocol {
        config.settings.progress_protocol = protocols[selection];
        save_settings(&config.settings)?;
        println!("\n{} {}", style("已儲存:").green(), protocols[selection]);
        std::thread::sleep(std::time::Duration::from_secs(1));
    }

    Ok(())
}

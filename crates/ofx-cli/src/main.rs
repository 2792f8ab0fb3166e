//! OFX 명세서 수집 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 설정된 모든 계좌의 명세서 수집
//! ofxget fetch
//!
//! # 특정 사이트만, 조회 기간 90일
//! ofxget fetch -s Vanguard -i 90
//!
//! # 가져오기 디렉토리의 수동 다운로드 파일 재가공
//! ofxget import
//!
//! # 파일 하나를 사이트 규칙으로 보정 / 구조 검증
//! ofxget scrub statement.ofx -s Discover
//! ofxget validate statement.ofx
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::{error, warn};

use ofx_core::{init_logging, AppConfig, LogConfig};

mod commands;

#[derive(Parser)]
#[command(name = "ofxget")]
#[command(about = "OFX statement downloader - 금융기관 명세서 수집 및 보정 도구", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일 경로
    #[arg(short, long, global = true, default_value = "config/ofxget.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 설정된 계좌의 명세서를 서버에서 받아 보정
    Fetch {
        /// 이 사이트의 계좌만 수집
        #[arg(short, long)]
        site: Option<String>,

        /// 조회 기간 (일, 기본: 설정의 default_interval_days)
        #[arg(short, long)]
        interval: Option<u32>,
    },

    /// 가져오기 디렉토리의 수동 다운로드 파일 재가공
    Import {
        /// 가져오기 디렉토리 (기본: 설정의 import_dir)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// OFX 파일 하나를 보정 (제자리 수정)
    Scrub {
        /// 대상 파일
        file: PathBuf,

        /// 적용할 사이트 규칙 (생략 시 FID/BANKID로 찾음)
        #[arg(short, long)]
        site: Option<String>,
    },

    /// OFX 파일 구조 검증
    Validate {
        /// 대상 파일
        file: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let (config, config_found) = load_config(&cli.config)?;

    init_logging(LogConfig::from_settings(&config.logging))
        .map_err(|e| anyhow!("failed to initialize logging: {}", e))?;
    if !config_found {
        warn!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    let ok = match cli.command {
        Commands::Fetch { site, interval } => {
            commands::fetch::run(config, site.as_deref(), interval).await?
        }
        Commands::Import { dir } => commands::import::run(&config, dir)?.all_imported(),
        Commands::Scrub { file, site } => commands::scrub::run(&config, &file, site.as_deref())?,
        Commands::Validate { file } => commands::validate::run(&file)?,
    };

    if ok {
        Ok(ExitCode::SUCCESS)
    } else {
        error!("Finished with errors");
        Ok(ExitCode::FAILURE)
    }
}

/// 설정 파일을 로드합니다. 파일이 없으면 기본값으로 시작합니다.
fn load_config(path: &std::path::Path) -> Result<(AppConfig, bool)> {
    if path.exists() {
        let config = AppConfig::load(path)?;
        Ok((config, true))
    } else {
        let config = AppConfig::from_toml_str("")?;
        Ok((config, false))
    }
}

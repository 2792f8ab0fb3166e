//! 수동 다운로드 파일 가져오기 명령어.
//!
//! 가져오기 디렉토리에서 확장자가 있는 파일을 찾아 OFX로 보이는 것만 재가공하고,
//! 전송 디렉토리로 옮깁니다. 원래 이름은 유지하되 `.ofx`가 아니면 확장자를 덧붙입니다
//! (`statement.qfx` → `statement.qfx.ofx`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use ofx_core::AppConfig;
use ofx_scrub::{import_file, ScrubError, ScrubOptions, Scrubber};

/// 가져오기 실행 결과.
#[derive(Debug, Default)]
pub struct ImportSummary {
    /// 옮겨진 파일 (최종 경로)
    pub imported: Vec<PathBuf>,
    /// OFX가 아니어서 건너뛴 파일
    pub ignored: Vec<PathBuf>,
    /// 처리 중 에러가 난 파일
    pub failed: Vec<PathBuf>,
}

impl ImportSummary {
    /// 에러 없이 끝났는지 여부.
    pub fn all_imported(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 전송 디렉토리 안의 목적지 경로.
pub fn import_destination(xfr_dir: &Path, file_name: &str) -> PathBuf {
    let is_ofx = Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext == "ofx");
    if is_ofx {
        xfr_dir.join(file_name)
    } else {
        xfr_dir.join(format!("{}.ofx", file_name))
    }
}

/// 디렉토리의 파일을 가져옵니다.
pub fn import_dir(dir: &Path, xfr_dir: &Path, config: &AppConfig, scrubber: &Scrubber) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    if !dir.is_dir() {
        info!(dir = %dir.display(), "Import directory does not exist");
        return Ok(summary);
    }
    info!(dir = %dir.display(), "Searching for statements to import");

    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("cannot read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some())
        .collect();
    entries.sort();

    for path in entries {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };

        match import_file(&path, &config.sites, scrubber) {
            Ok(_) => {
                std::fs::create_dir_all(xfr_dir)
                    .with_context(|| format!("cannot create {}", xfr_dir.display()))?;
                let dest = import_destination(xfr_dir, &file_name);
                match std::fs::rename(&path, &dest) {
                    Ok(()) => {
                        info!(file = %file_name, dest = %dest.display(), "Import file saved");
                        summary.imported.push(dest);
                    }
                    Err(e) => {
                        warn!(file = %file_name, error = %e, "Unable to move imported file");
                        summary.failed.push(path);
                    }
                }
            }
            Err(ScrubError::InvalidDocument(reason)) => {
                debug!(file = %file_name, %reason, "Not an OFX file, skipping");
                summary.ignored.push(path);
            }
            Err(e) => {
                warn!(file = %file_name, error = %e, "Import failed");
                summary.failed.push(path);
            }
        }
    }

    Ok(summary)
}

/// 설정의 디렉토리(또는 지정한 디렉토리)에서 가져오기를 실행합니다.
pub fn run(config: &AppConfig, dir: Option<PathBuf>) -> Result<ImportSummary> {
    let dir = dir.unwrap_or_else(|| config.download.import_dir.clone());
    let scrubber = Scrubber::new(ScrubOptions::from(&config.scrub));
    let summary = import_dir(&dir, &config.download.xfr_dir, config, &scrubber)?;

    for path in &summary.imported {
        println!("import file  {}", path.display());
    }
    Ok(summary)
}

//! 구조 검증 명령어.

use std::path::Path;

use anyhow::{Context, Result};
use ofx_scrub::read_text;

/// 파일을 검증하고 결과를 출력합니다. 유효하면 `true`.
pub fn run(file: &Path) -> Result<bool> {
    let raw = read_text(file)
        .with_context(|| format!("cannot read {}", file.display()))?
        .text;
    match ofx_core::validate(&raw) {
        Ok(()) => {
            println!("{}: OK", file.display());
            Ok(true)
        }
        Err(reason) => {
            println!("{}: {}", file.display(), reason);
            Ok(false)
        }
    }
}

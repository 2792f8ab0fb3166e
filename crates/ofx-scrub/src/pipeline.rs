//! 스크럽 파이프라인.
//!
//! 단계는 항상 다음 순서로 실행됩니다.
//!
//! 1. 헤더 공백 제거
//! 2. 자정/누락 시각 정규화
//! 3. `DTASOF` 시각 보정 (사이트 `timeoffset`이 0이 아닐 때)
//! 4. `DTEND` 백필
//! 5. 매수/매도 부호 교정
//! 6. 재투자 부호 교정
//! 7. 0원 거래 제거 (설정 시)
//! 8. 일반 정리
//! 9. 기관별 플러그인

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use chrono::{Local, NaiveDateTime};
use ofx_core::{validate, NumberLocale, ScrubConfig, SiteProfile};
use tracing::{debug, error, info, warn};

use crate::document::Document;
use crate::error::{ScrubError, ScrubResult};
use crate::plugins::PluginRegistry;
use crate::stages;
use crate::state::ScrubState;
use crate::text_file::{read_text, write_text};

/// 스크럽 옵션.
#[derive(Debug, Clone, Default)]
pub struct ScrubOptions {
    /// 0원 거래 제거 전역 기본값 (사이트 설정이 우선)
    pub skip_zero_transactions: bool,
    /// 알림을 debug 레벨로 낮춤
    pub quiet: bool,
    /// 숫자 표기 로케일
    pub locale: NumberLocale,
}

impl From<&ScrubConfig> for ScrubOptions {
    fn from(config: &ScrubConfig) -> Self {
        Self {
            skip_zero_transactions: config.skip_zero_transactions,
            quiet: config.quiet,
            locale: config.number_locale,
        }
    }
}

/// 한 번의 스크럽 실행 결과.
#[derive(Debug, Clone)]
pub struct ScrubReport {
    /// 결과 문서
    pub text: String,
    /// 적용된 보정 설명
    pub notes: Vec<String>,
}

impl ScrubReport {
    /// 변경 여부.
    pub fn changed(&self) -> bool {
        !self.notes.is_empty()
    }
}

/// 스크럽 실행기.
pub struct Scrubber {
    options: ScrubOptions,
    registry: PluginRegistry,
}

impl Scrubber {
    /// 기본 플러그인으로 생성합니다.
    pub fn new(options: ScrubOptions) -> Self {
        Self::with_registry(options, PluginRegistry::with_defaults())
    }

    /// 플러그인 레지스트리를 지정해 생성합니다.
    pub fn with_registry(options: ScrubOptions, registry: PluginRegistry) -> Self {
        Self { options, registry }
    }

    /// 옵션.
    pub fn options(&self) -> &ScrubOptions {
        &self.options
    }

    /// 현재 시각 기준으로 문서를 보정합니다.
    pub fn scrub(&self, text: &str, site: &SiteProfile) -> String {
        self.scrub_at(text, site, Local::now().naive_local()).text
    }

    /// 기준 시각을 지정해 문서를 보정합니다.
    pub fn scrub_at(&self, text: &str, site: &SiteProfile, now: NaiveDateTime) -> ScrubReport {
        let mut notes = Vec::new();
        let mut doc = Document::parse(text);
        let locale = &self.options.locale;

        let mut note = |count: usize, what: &str| {
            if count > 0 {
                notes.push(format!("{} ({})", what, count));
            }
        };

        note(stages::strip_header_spaces(&mut doc), "Removed whitespace from header values");
        note(stages::normalize_null_times(&mut doc), "Replaced null time values with noon");
        if site.timeoffset != 0.0 {
            note(
                stages::shift_as_of_times(&mut doc, site.timeoffset),
                "Shifted DTASOF values by site time offset",
            );
        }
        note(stages::backfill_statement_end(&mut doc, now), "Added missing DTEND");
        note(stages::correct_trade_signs(&mut doc, locale), "Corrected INVBUY/INVSELL signs");
        note(stages::correct_reinvest_signs(&mut doc, locale), "Corrected REINVEST signs");
        if site.skip_zero_transactions(self.options.skip_zero_transactions) {
            note(
                stages::remove_zero_transactions(&mut doc, locale),
                "Removed zero-amount transactions",
            );
        }
        let cleanup = stages::general_cleanup(&mut doc);
        note(cleanup.removed_tags, "Removed unsupported tags");
        note(cleanup.escaped_texts, "Escaped bare ampersands");
        note(cleanup.filled_types, "Filled empty TRNTYPE with OTHER");

        let mut text = doc.to_string();
        text = self.run_plugins(text, site, &mut notes);

        for n in &notes {
            if self.options.quiet {
                debug!("Scrub: {}", n);
            } else {
                info!("Scrub: {}", n);
            }
        }

        ScrubReport { text, notes }
    }

    fn run_plugins(&self, mut text: String, site: &SiteProfile, notes: &mut Vec<String>) -> String {
        let statement = site.statement_kind();
        let mut state = ScrubState::new();

        for plugin in self.registry.matching(&site.url, statement) {
            let snapshot = state.clone();
            let outcome = catch_unwind(AssertUnwindSafe(|| plugin.apply(&text, statement, &mut state)))
                .unwrap_or_else(|_| Err(ScrubError::plugin(plugin.name(), "plugin panicked")));

            match outcome {
                Ok(output) => match validate(&output) {
                    Ok(()) => {
                        if output != text {
                            notes.push(format!("Applied plugin {}", plugin.name()));
                        }
                        text = output;
                    }
                    Err(reason) => {
                        warn!(plugin = plugin.name(), %reason, "Plugin output failed validation; discarded");
                        state = snapshot;
                    }
                },
                Err(e) => {
                    error!(plugin = plugin.name(), error = %e, "Scrub plugin failed; output discarded");
                    state = snapshot;
                }
            }
        }

        text
    }

    /// 파일을 읽어 보정한 뒤 같은 경로에 다시 씁니다.
    pub fn scrub_file(&self, path: impl AsRef<Path>, site: &SiteProfile) -> ScrubResult<ScrubReport> {
        let path = path.as_ref();
        let file = read_text(path)?;
        let report = self.scrub_at(&file.text, site, Local::now().naive_local());
        if report.text != file.text {
            write_text(path, &report.text, file.encoding)?;
        }
        debug!(path = %path.display(), notes = report.notes.len(), "Scrubbed file");
        Ok(report)
    }
}

impl Default for Scrubber {
    fn default() -> Self {
        Self::new(ScrubOptions::default())
    }
}

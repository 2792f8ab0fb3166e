//! 기관별 스크럽 플러그인.
//!
//! 플러그인은 사이트 URL과 명세서 종류로 선택되며, 문서 텍스트와 실행 단위
//! [`ScrubState`]를 받아 수정된 텍스트를 반환합니다. 파이프라인은 결과를
//! 검증해 통과한 경우에만 반영합니다.

pub mod discover;

pub use discover::DiscoverPlugin;

use ofx_core::StatementKind;

use crate::error::ScrubResult;
use crate::state::ScrubState;

/// 기관별 보정 플러그인.
pub trait InstitutionPlugin: Send + Sync {
    /// 로그에 표시할 이름.
    fn name(&self) -> &str;

    /// 적용 대상인지 여부. `site_url`은 대문자로 정규화되어 전달됩니다.
    fn matches(&self, site_url: &str, statement: Option<StatementKind>) -> bool;

    /// 문서를 보정합니다.
    fn apply(
        &self,
        ofx: &str,
        statement: Option<StatementKind>,
        state: &mut ScrubState,
    ) -> ScrubResult<String>;
}

/// 플러그인 레지스트리.
pub struct PluginRegistry {
    plugins: Vec<Box<dyn InstitutionPlugin>>,
}

impl PluginRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn empty() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// 기본 플러그인이 등록된 레지스트리를 생성합니다.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(DiscoverPlugin);
        registry
    }

    /// 플러그인을 등록합니다.
    pub fn register<P: InstitutionPlugin + 'static>(&mut self, plugin: P) {
        self.plugins.push(Box::new(plugin));
    }

    /// 사이트에 적용할 플러그인 (등록 순서).
    pub fn matching<'a>(
        &'a self,
        site_url: &'a str,
        statement: Option<StatementKind>,
    ) -> impl Iterator<Item = &'a dyn InstitutionPlugin> + 'a {
        let url = site_url.to_ascii_uppercase();
        self.plugins
            .iter()
            .map(|p| p.as_ref())
            .filter(move |p| p.matches(&url, statement))
    }

    /// 등록된 플러그인 이름.
    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

//! 스크럽 1회 실행 동안 유지되는 상태.

use std::collections::HashSet;

/// 고유 ID 접미사의 최대값.
pub const MAX_ID_SEQUENCE: u32 = 9999;

/// 파이프라인 실행 단위 상태.
///
/// 플러그인이 문서 안에서 재작성한 ID의 고유성을 보장할 때 사용합니다.
/// 실행마다 새로 만들어지므로 문서 사이에 공유되지 않습니다.
#[derive(Debug, Clone, Default)]
pub struct ScrubState {
    known_ids: HashSet<String>,
}

impl ScrubState {
    /// 빈 상태 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// `base`에 가장 작은 순번(0..=9999)을 붙여 아직 쓰이지 않은 ID를 만들고 등록합니다.
    ///
    /// 모든 순번이 이미 쓰였으면 마지막 순번을 그대로 사용합니다.
    pub fn claim_unique(&mut self, base: &str) -> String {
        let mut seq = 0;
        let mut candidate = format!("{}{}", base, seq);
        while seq < MAX_ID_SEQUENCE && self.known_ids.contains(&candidate) {
            seq += 1;
            candidate = format!("{}{}", base, seq);
        }
        self.known_ids.insert(candidate.clone());
        candidate
    }

    /// 등록된 ID 수.
    pub fn known_count(&self) -> usize {
        self.known_ids.len()
    }
}

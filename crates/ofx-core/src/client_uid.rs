//! 클라이언트 UID 영속화.
//!
//! OFX 103 이상 서버는 로그인 메시지에 `CLIENTUID`를 요구합니다.
//! 사이트 프로필에 값이 없으면 (사이트 URL, 사용자) 조합마다 한 번 생성하고
//! 이후 실행에서 같은 값을 재사용하도록 저장합니다.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::OfxResult;

/// 클라이언트 UID 저장소.
pub trait ClientUidStore {
    /// 저장된 UID를 반환하거나, 없으면 새로 생성해 저장합니다.
    fn get_or_create(&mut self, url: &str, user: &str) -> OfxResult<String>;
}

fn store_key(url: &str, user: &str) -> String {
    format!("{}|{}", url.trim(), user.trim())
}

fn new_uid() -> String {
    Uuid::new_v4().to_string().to_uppercase()
}

/// 메모리 전용 저장소 (테스트 및 일회성 실행용).
#[derive(Debug, Default)]
pub struct MemoryClientUidStore {
    entries: BTreeMap<String, String>,
}

impl MemoryClientUidStore {
    /// 빈 저장소 생성.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientUidStore for MemoryClientUidStore {
    fn get_or_create(&mut self, url: &str, user: &str) -> OfxResult<String> {
        let uid = self
            .entries
            .entry(store_key(url, user))
            .or_insert_with(new_uid)
            .clone();
        Ok(uid)
    }
}

/// JSON 파일 기반 저장소.
#[derive(Debug)]
pub struct JsonClientUidStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonClientUidStore {
    /// 파일에서 저장소를 엽니다. 파일이 없으면 빈 저장소로 시작합니다.
    pub fn open(path: impl AsRef<Path>) -> OfxResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), count = entries.len(), "Client UID store opened");
        Ok(Self { path, entries })
    }

    fn save(&self) -> OfxResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl ClientUidStore for JsonClientUidStore {
    fn get_or_create(&mut self, url: &str, user: &str) -> OfxResult<String> {
        let key = store_key(url, user);
        if let Some(uid) = self.entries.get(&key) {
            return Ok(uid.clone());
        }

        let uid = new_uid();
        self.entries.insert(key, uid.clone());
        self.save()?;
        info!(url = %url, "Generated new client UID");
        Ok(uid)
    }
}

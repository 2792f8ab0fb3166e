//! OFX 파일 읽기/쓰기.
//!
//! 서버 응답은 ASCII로 저장되지만, 수동으로 받은 1.x 파일은 헤더에 `CHARSET:1252`를
//! 선언하고 `é` 같은 Windows-1252 바이트를 담는 경우가 많습니다. UTF-8로 읽히지 않는
//! 파일은 Windows-1252로 해석하고, 다시 쓸 때도 같은 인코딩을 유지합니다.

use std::path::Path;

use encoding_rs::WINDOWS_1252;

/// 파일의 원래 인코딩.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8 (ASCII 포함)
    Utf8,
    /// Windows-1252
    Windows1252,
}

/// 디코딩된 파일 내용.
#[derive(Debug, Clone)]
pub struct TextFile {
    /// 본문
    pub text: String,
    /// 원래 인코딩
    pub encoding: TextEncoding,
}

/// 바이트를 디코딩합니다.
pub fn decode(bytes: Vec<u8>) -> TextFile {
    match String::from_utf8(bytes) {
        Ok(text) => TextFile {
            text,
            encoding: TextEncoding::Utf8,
        },
        Err(e) => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(e.as_bytes());
            TextFile {
                text: text.into_owned(),
                encoding: TextEncoding::Windows1252,
            }
        }
    }
}

/// 파일을 읽어 디코딩합니다.
pub fn read_text(path: impl AsRef<Path>) -> std::io::Result<TextFile> {
    Ok(decode(std::fs::read(path)?))
}

/// 주어진 인코딩으로 파일을 씁니다.
///
/// Windows-1252로 표현할 수 없는 문자는 숫자 문자 참조(`&#NNNN;`)로 바뀝니다.
pub fn write_text(path: impl AsRef<Path>, text: &str, encoding: TextEncoding) -> std::io::Result<()> {
    match encoding {
        TextEncoding::Utf8 => std::fs::write(path, text),
        TextEncoding::Windows1252 => {
            let (bytes, _, _) = WINDOWS_1252.encode(text);
            std::fs::write(path, bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_is_kept() {
        let file = decode("Café".as_bytes().to_vec());
        assert_eq!(file.encoding, TextEncoding::Utf8);
        assert_eq!(file.text, "Café");
    }

    #[test]
    fn test_windows_1252_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stmt.ofx");
        std::fs::write(&path, b"<NAME>Caf\xE9 \x80\r\n").unwrap();

        let file = read_text(&path).unwrap();
        assert_eq!(file.encoding, TextEncoding::Windows1252);
        assert_eq!(file.text, "<NAME>Caf\u{e9} \u{20ac}\r\n");

        write_text(&path, &file.text, file.encoding).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"<NAME>Caf\xE9 \x80\r\n");
    }
}

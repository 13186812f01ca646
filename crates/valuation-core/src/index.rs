//! 추적 대상 지수 설정.
//!
//! 지수별 이름/코드/데이터 URL을 관리합니다. 기본값은 中证 红利低波 계열
//! 두 지수이며, 환경변수 목록이나 TOML 파일로 교체할 수 있습니다.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// 단일 지수 설정.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// 지수 이름
    pub name: String,
    /// 지수 코드
    pub code: String,
    /// Excel 지표 파일 URL (없으면 기본 URL 규칙 사용)
    #[serde(default)]
    pub url: Option<String>,
    /// 설명
    #[serde(default)]
    pub description: String,
}

impl IndexConfig {
    /// 새 지수 설정을 생성합니다. 설명은 `이름(코드)`로 채워집니다.
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        let name = name.into();
        let code = code.into();
        let description = format!("{}({})", name, code);
        Self {
            name,
            code,
            url: None,
            description,
        }
    }

    /// Excel 파일 URL을 지정합니다.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// 설명을 지정합니다.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 비어 있는 설명을 기본값으로 채웁니다.
    fn normalized(mut self) -> Self {
        if self.description.trim().is_empty() {
            self.description = format!("{}({})", self.name, self.code);
        }
        self
    }
}

/// TOML 파일 구조 (`[[indexes]]` 배열).
#[derive(Debug, Deserialize)]
struct IndexFile {
    #[serde(default)]
    indexes: Vec<IndexConfig>,
}

/// 지수 설정 목록 (등록 순서 유지).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCatalog {
    indexes: Vec<IndexConfig>,
}

impl Default for IndexCatalog {
    fn default() -> Self {
        Self {
            indexes: vec![
                IndexConfig::new("红利低波指数", "H30269").with_description("中证红利低波指数"),
                IndexConfig::new("红利低波100指数", "930955")
                    .with_description("中证红利低波100指数"),
            ],
        }
    }
}

impl IndexCatalog {
    /// 주어진 목록으로 카탈로그를 생성합니다.
    pub fn new(indexes: Vec<IndexConfig>) -> Self {
        let mut catalog = Self {
            indexes: Vec::with_capacity(indexes.len()),
        };
        for index in indexes {
            catalog.add(index);
        }
        catalog
    }

    /// `코드:이름,코드:이름` 형식의 목록을 파싱합니다.
    ///
    /// 이름이 없으면 코드를 이름으로 사용합니다.
    pub fn parse_list(list: &str) -> CoreResult<Self> {
        let mut indexes = Vec::new();
        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (code, name) = match entry.split_once(':') {
                Some((code, name)) => (code.trim(), name.trim()),
                None => (entry, entry),
            };
            if code.is_empty() {
                return Err(CoreError::InvalidInput(format!("지수 코드가 비어 있음: '{}'", entry)));
            }
            let name = if name.is_empty() { code } else { name };
            indexes.push(IndexConfig::new(name, code));
        }

        if indexes.is_empty() {
            return Err(CoreError::Config("지수 목록이 비어 있습니다".to_string()));
        }
        Ok(Self::new(indexes))
    }

    /// TOML 문자열에서 카탈로그를 읽습니다.
    ///
    /// ```toml
    /// [[indexes]]
    /// name = "红利低波指数"
    /// code = "H30269"
    /// ```
    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        let file: IndexFile = toml::from_str(content)?;
        if file.indexes.is_empty() {
            return Err(CoreError::Config("지수 목록이 비어 있습니다".to_string()));
        }
        Ok(Self::new(file.indexes))
    }

    /// TOML 파일에서 카탈로그를 읽습니다.
    pub fn from_toml_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("지수 설정 파일 읽기 실패 ({}): {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// 코드로 지수 설정을 조회합니다.
    pub fn find(&self, code: &str) -> Option<&IndexConfig> {
        self.indexes.iter().find(|index| index.code == code)
    }

    /// 모든 지수 설정.
    pub fn all(&self) -> &[IndexConfig] {
        &self.indexes
    }

    /// 등록된 지수 수.
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// 비어 있는지 여부.
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// 지수 설정을 추가합니다. 같은 코드가 있으면 교체합니다.
    pub fn add(&mut self, index: IndexConfig) {
        let index = index.normalized();
        match self.indexes.iter_mut().find(|i| i.code == index.code) {
            Some(existing) => *existing = index,
            None => self.indexes.push(index),
        }
    }

    /// 지수 설정을 제거합니다. 제거된 설정을 반환합니다.
    pub fn remove(&mut self, code: &str) -> Option<IndexConfig> {
        let pos = self.indexes.iter().position(|i| i.code == code)?;
        Some(self.indexes.remove(pos))
    }

    /// 요청한 코드 순서대로 지수 설정을 골라냅니다.
    ///
    /// 등록되지 않은 코드가 있으면 에러를 반환합니다.
    pub fn select(&self, codes: &[String]) -> CoreResult<Vec<IndexConfig>> {
        codes
            .iter()
            .map(|code| {
                self.find(code.trim())
                    .cloned()
                    .ok_or_else(|| CoreError::UnknownIndex(code.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let catalog = IndexCatalog::default();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.all()[0].code, "H30269");
        assert_eq!(catalog.find("930955").unwrap().description, "中证红利低波100指数");
    }

    #[test]
    fn test_description_defaults_to_name_and_code() {
        let index = IndexConfig::new("红利指数", "000922");
        assert_eq!(index.description, "红利指数(000922)");
    }

    #[test]
    fn test_add_replaces_same_code() {
        let mut catalog = IndexCatalog::default();
        catalog.add(IndexConfig::new("新名称", "H30269").with_url("https://example.com/a.xls"));

        assert_eq!(catalog.len(), 2);
        let index = catalog.find("H30269").unwrap();
        assert_eq!(index.name, "新名称");
        assert_eq!(index.url.as_deref(), Some("https://example.com/a.xls"));
    }

    #[test]
    fn test_remove() {
        let mut catalog = IndexCatalog::default();
        assert!(catalog.remove("H30269").is_some());
        assert!(catalog.remove("H30269").is_none());
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_parse_list() {
        let catalog = IndexCatalog::parse_list("H30269:红利低波, 000922").unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.find("H30269").unwrap().name, "红利低波");
        assert_eq!(catalog.find("000922").unwrap().name, "000922");

        assert!(IndexCatalog::parse_list(" , ").is_err());
        assert!(IndexCatalog::parse_list(":이름").is_err());
    }

    #[test]
    fn test_from_toml_str() {
        let catalog = IndexCatalog::from_toml_str(
            r#"
            [[indexes]]
            name = "红利低波指数"
            code = "H30269"

            [[indexes]]
            name = "自定义指数"
            code = "XXXXXX"
            url = "https://example.com/data.xls"
            description = "自定义指数描述"
            "#,
        )
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.find("H30269").unwrap().description, "红利低波指数(H30269)");
        assert_eq!(
            catalog.find("XXXXXX").unwrap().url.as_deref(),
            Some("https://example.com/data.xls")
        );
        assert!(IndexCatalog::from_toml_str("indexes = []").is_err());
    }

    #[test]
    fn test_select_keeps_requested_order() {
        let catalog = IndexCatalog::default();
        let selected = catalog
            .select(&["930955".to_string(), "H30269".to_string()])
            .unwrap();
        assert_eq!(selected[0].code, "930955");
        assert_eq!(selected[1].code, "H30269");

        let err = catalog.select(&["NOPE".to_string()]).unwrap_err();
        assert!(matches!(err, CoreError::UnknownIndex(code) if code == "NOPE"));
    }
}

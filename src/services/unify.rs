//! 部署单元统一
//!
//! 规则和页面都是「名称 + 可选脚本 + 可选元数据」的形状，共用一个泛型 `unify`。

use serde_json::Value;

use crate::domain::units::{
    DatabaseUnit, PageUnit, RuleUnit, UnifiedDatabase, UnifiedItem, UnifiedScript,
};

/// 可统一为 `UnifiedItem` 的单元
pub trait Unifiable {
    fn name(&self) -> &str;

    /// 脚本内容（页面为 HTML）
    fn script(&self) -> Option<&str>;

    /// 元数据
    fn metadata(&self) -> Option<Value>;
}

impl Unifiable for RuleUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn script(&self) -> Option<&str> {
        self.script_content.as_deref().filter(|_| self.has_script)
    }

    fn metadata(&self) -> Option<Value> {
        self.metadata_content.clone().filter(|_| self.has_metadata)
    }
}

impl Unifiable for PageUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn script(&self) -> Option<&str> {
        self.html_content.as_deref()
    }

    /// 页面元数据按 JSON 解析，解析失败时保留原始文本
    fn metadata(&self) -> Option<Value> {
        let raw = self.metadata_content.as_deref().filter(|_| self.has_metadata)?;
        Some(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())))
    }
}

/// 统一规则或页面
pub fn unify<U: Unifiable>(units: &[U]) -> Vec<UnifiedItem> {
    units
        .iter()
        .map(|unit| {
            let script_file = unit.script().map(str::to_string);
            let metadata_file = unit.metadata();
            UnifiedItem {
                name: unit.name().to_string(),
                script: script_file.is_some(),
                script_file,
                metadata: metadata_file.is_some(),
                metadata_file,
            }
        })
        .collect()
}

/// 统一数据库连接：阶段名即 apply 步骤使用的脚本名
pub fn unify_databases(units: &[DatabaseUnit]) -> Vec<UnifiedDatabase> {
    units
        .iter()
        .map(|db| UnifiedDatabase {
            name: db.name.clone(),
            scripts: db
                .scripts
                .iter()
                .map(|s| UnifiedScript {
                    name: s.stage.clone(),
                    script_file: s.content.clone(),
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::units::DatabaseScript;
    use serde_json::json;

    #[test]
    fn test_unify_rules() {
        let rules = vec![
            RuleUnit {
                name: "add-roles".to_string(),
                has_script: true,
                script_content: Some("function () {}".to_string()),
                has_metadata: false,
                metadata_content: None,
            },
            RuleUnit {
                name: "disabled".to_string(),
                has_script: false,
                script_content: None,
                has_metadata: true,
                metadata_content: Some(json!({ "enabled": false })),
            },
        ];

        let unified = unify(&rules);
        assert_eq!(unified[0].name, "add-roles");
        assert!(unified[0].script);
        assert!(!unified[0].metadata);
        assert_eq!(unified[1].metadata_file, Some(json!({ "enabled": false })));
        assert!(!unified[1].script);
        assert_eq!(unified[1].script_file, None);
    }

    #[test]
    fn test_unify_pages_shares_shape() {
        let pages = vec![
            PageUnit {
                name: "login".to_string(),
                has_metadata: true,
                html_content: Some("<html/>".to_string()),
                metadata_content: Some(r#"{"enabled":true}"#.to_string()),
            },
            PageUnit {
                name: "error_page".to_string(),
                has_metadata: true,
                html_content: None,
                metadata_content: Some("not json".to_string()),
            },
        ];

        let unified = unify(&pages);
        assert!(unified[0].script);
        assert_eq!(unified[0].metadata_file, Some(json!({ "enabled": true })));
        assert!(!unified[1].script);
        assert_eq!(unified[1].metadata_file, Some(json!("not json")));
    }

    #[test]
    fn test_unify_databases_maps_stage_to_name() {
        let dbs = vec![DatabaseUnit {
            name: "users".to_string(),
            scripts: vec![DatabaseScript {
                stage: "get_user".to_string(),
                content: "function getUser() {}".to_string(),
            }],
        }];

        let unified = unify_databases(&dbs);
        assert_eq!(unified[0].name, "users");
        assert_eq!(unified[0].scripts[0].name, "get_user");
        assert_eq!(unified[0].scripts[0].script_file, "function getUser() {}");

        let json = serde_json::to_value(&unified[0]).unwrap();
        assert_eq!(json["scripts"][0]["scriptFile"], "function getUser() {}");
    }
}

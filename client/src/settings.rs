//! 客户端设置
//!
//! 提供设置数据结构与 JSON 持久化

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 远程站点的登录信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteAccount {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

/// 客户端设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// 玩家昵称
    pub player_id: String,
    /// 练习桌 AI 难度 (1-10)
    pub ai_level: u8,
    /// 可选的远程站点
    pub remote: Option<RemoteAccount>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            player_id: "player".to_string(),
            ai_level: 3,
            remote: None,
        }
    }
}

impl Settings {
    /// 设置文件路径
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut path| {
            path.push("chess-client");
            path.push("settings.json");
            path
        })
    }

    /// 从配置目录加载设置，失败时回落到默认值
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            tracing::warn!("无法获取配置目录，使用默认设置");
            return Self::default();
        };
        Self::load_from(&path)
    }

    fn load_from(path: &std::path::Path) -> Self {
        if !path.exists() {
            tracing::info!("设置文件不存在，使用默认设置");
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => {
                    tracing::info!("已加载设置: {:?}", path);
                    settings
                }
                Err(e) => {
                    tracing::warn!("设置文件格式无效: {}，使用默认设置", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("无法读取设置文件: {}，使用默认设置", e);
                Self::default()
            }
        }
    }

    /// 保存设置到配置目录
    pub fn save(&self) -> Result<(), String> {
        let Some(path) = Self::settings_path() else {
            return Err("无法获取配置目录".to_string());
        };
        self.save_to(&path)
    }

    fn save_to(&self, path: &std::path::Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| format!("无法创建配置目录: {}", e))?;
        }
        let content =
            serde_json::to_string_pretty(self).map_err(|e| format!("序列化设置失败: {}", e))?;
        std::fs::write(path, content).map_err(|e| format!("写入设置文件失败: {}", e))?;
        tracing::info!("已保存设置: {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = Settings::default();
        settings.player_id = "alice".to_string();
        settings.ai_level = 7;
        settings.remote = Some(RemoteAccount {
            host: "play.example.net".to_string(),
            port: 8000,
            password: Some("secret".to_string()),
        });

        settings.save_to(&path).unwrap();
        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.player_id, "alice");
        assert_eq!(loaded.ai_level, 7);
        assert_eq!(loaded.remote.unwrap().port, 8000);
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Settings::load_from(&dir.path().join("absent.json"));
        assert_eq!(loaded.player_id, Settings::default().player_id);
    }
}

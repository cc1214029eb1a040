//! 车辆图片推断
//!
//! 记录没有 `imageUrl` 时，按消息中出现的品牌 + 车型匹配一张展示图。

use regex::Regex;

use crate::notification::Notification;

struct ImageRule {
    make: Regex,
    model: Regex,
    url: &'static str,
}

/// 车辆图片解析器
pub struct VehicleImageResolver {
    rules: Vec<ImageRule>,
}

impl VehicleImageResolver {
    pub fn new() -> Self {
        let table: [(&str, &str, &'static str); 4] = [
            ("toyota", "corolla", "https://i.imgur.com/biZb0ua.png"),
            ("chevrolet", "malibu", "https://i.imgur.com/muFk0C5.png"),
            ("honda", "civic", "https://i.imgur.com/yFSuVQY.png"),
            ("ford", "mustang", "https://i.imgur.com/yOURDEFAULTFALLBACK.png"),
        ];
        let rules = table
            .iter()
            .filter_map(|(make, model, url)| {
                Some(ImageRule {
                    make: Regex::new(&format!(r"(?i)\b{}\b", make)).ok()?,
                    model: Regex::new(&format!(r"(?i)\b{}\b", model)).ok()?,
                    url,
                })
            })
            .collect();
        Self { rules }
    }

    /// 根据文本推断图片
    pub fn infer(&self, text: &str) -> Option<&'static str> {
        self.rules
            .iter()
            .find(|rule| rule.make.is_match(text) && rule.model.is_match(text))
            .map(|rule| rule.url)
    }

    /// 记录自带图片优先，否则从标题 + 消息推断
    pub fn resolve(&self, n: &Notification) -> Option<String> {
        if let Some(url) = n.image_url.as_deref().filter(|u| !u.is_empty()) {
            return Some(url.to_string());
        }
        let text = format!("{} {}", n.title, n.message);
        self.infer(&text).map(|url| url.to_string())
    }
}

impl Default for VehicleImageResolver {
    fn default() -> Self {
        Self::new()
    }
}

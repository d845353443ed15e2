//! Content library — the fixed pools of receipt copy.
//!
//! Templates may carry the `你们` and `属于` placeholders; the generator
//! substitutes them with the display name. Pools are built once at startup and
//! never mutated afterwards.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use thiserror::Error;

/// Structural minimums the generator relies on.
pub const MIN_SYSTEM_ENTRIES: usize = 2;
pub const MIN_INGREDIENT_ENTRIES: usize = 4;

const SYSTEM: &[&str] = &[
    "正在读取你们的心动频率...",
    "检测到一段属于两个人的温柔时光",
    "浪漫打印机已为你们预热完毕",
    "这份回执属于此刻并肩的两颗心",
    "系统提示：你们的默契值已超出量程",
    "正在封存你们相视一笑的瞬间...",
];

const INGREDIENT: &[&str] = &[
    "+ 三勺清晨的阳光",
    "+ 一整杯没说出口的想念",
    "+ 半颗融化的奶糖",
    "+ 十二分的偏爱",
    "+ 一次并不意外的心跳加速",
    "+ 雨天共撑的一把伞",
    "+ 晚风里的第一句晚安",
    "+ 适量的小脾气与大大的拥抱",
    "+ 一张永远有效的电影票根",
    "+ 少许星光 (不限量供应)",
];

const ANALYSIS: &[&str] = &[
    "分析结果：你们的笑容重合度 99.9%",
    "分析结果：这是一段属于彼此的专属频道",
    "分析结果：检测到持续升温的甜度，请注意防烫",
    "分析结果：你们是彼此最好的默认设置",
];

const PRICE: &[&str] = &["无价", "一生的温柔", "每天一个拥抱", "全部的偏爱"];

const TOTAL: &[&str] = &["永久有效", "直到星星都睡着", "一万年 (可续期)", "余生"];

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("content pool '{pool}' needs at least {required} entries, found {found}")]
    TooFewEntries {
        pool: &'static str,
        required: usize,
        found: usize,
    },
}

/// On-disk shape of a replacement library.
#[derive(Debug, Deserialize)]
struct LibraryFile {
    system: Vec<String>,
    ingredient: Vec<String>,
    analysis: Vec<String>,
    price: Vec<String>,
    total: Vec<String>,
}

/// Read-only pools of receipt copy, grouped by category.
#[derive(Debug, Clone)]
pub struct ContentLibrary {
    system: Vec<String>,
    ingredient: Vec<String>,
    analysis: Vec<String>,
    price: Vec<String>,
    total: Vec<String>,
}

impl ContentLibrary {
    /// Builds a library, rejecting pools too small for a full receipt.
    pub fn new(
        system: Vec<String>,
        ingredient: Vec<String>,
        analysis: Vec<String>,
        price: Vec<String>,
        total: Vec<String>,
    ) -> Result<Self, LibraryError> {
        check_pool("system", &system, MIN_SYSTEM_ENTRIES)?;
        check_pool("ingredient", &ingredient, MIN_INGREDIENT_ENTRIES)?;
        check_pool("analysis", &analysis, 1)?;
        check_pool("price", &price, 1)?;
        check_pool("total", &total, 1)?;

        Ok(Self {
            system,
            ingredient,
            analysis,
            price,
            total,
        })
    }

    /// The copy shipped with the service.
    pub fn builtin() -> Self {
        let owned = |pool: &[&str]| -> Vec<String> { pool.iter().map(|s| s.to_string()).collect() };
        Self {
            system: owned(SYSTEM),
            ingredient: owned(INGREDIENT),
            analysis: owned(ANALYSIS),
            price: owned(PRICE),
            total: owned(TOTAL),
        }
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let file: LibraryFile =
            serde_json::from_str(raw).context("Content library is not valid JSON")?;
        Ok(Self::new(
            file.system,
            file.ingredient,
            file.analysis,
            file.price,
            file.total,
        )?)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read content library {}", path.display()))?;
        Self::from_json(&raw)
    }

    pub fn system(&self) -> &[String] {
        &self.system
    }

    pub fn ingredient(&self) -> &[String] {
        &self.ingredient
    }

    pub fn analysis(&self) -> &[String] {
        &self.analysis
    }

    pub fn price(&self) -> &[String] {
        &self.price
    }

    pub fn total(&self) -> &[String] {
        &self.total
    }
}

fn check_pool(pool: &'static str, entries: &[String], required: usize) -> Result<(), LibraryError> {
    if entries.len() < required {
        return Err(LibraryError::TooFewEntries {
            pool,
            required,
            found: entries.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_builtin_library_meets_minimums() {
        let lib = ContentLibrary::builtin();
        let rebuilt = ContentLibrary::new(
            lib.system().to_vec(),
            lib.ingredient().to_vec(),
            lib.analysis().to_vec(),
            lib.price().to_vec(),
            lib.total().to_vec(),
        );
        assert!(rebuilt.is_ok());
    }

    #[test]
    fn test_rejects_single_system_entry() {
        let err = ContentLibrary::new(
            strings(&["只有一条"]),
            strings(&["a", "b", "c", "d"]),
            strings(&["x"]),
            strings(&["p"]),
            strings(&["t"]),
        )
        .unwrap_err();

        match err {
            LibraryError::TooFewEntries {
                pool,
                required,
                found,
            } => {
                assert_eq!(pool, "system");
                assert_eq!(required, 2);
                assert_eq!(found, 1);
            }
        }
    }

    #[test]
    fn test_rejects_three_ingredients() {
        let result = ContentLibrary::new(
            strings(&["s1", "s2"]),
            strings(&["a", "b", "c"]),
            strings(&["x"]),
            strings(&["p"]),
            strings(&["t"]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_empty_price_pool() {
        let result = ContentLibrary::new(
            strings(&["s1", "s2"]),
            strings(&["a", "b", "c", "d"]),
            strings(&["x"]),
            vec![],
            strings(&["t"]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_from_json_reads_all_pools() {
        let raw = r#"{
            "system": ["你们 A", "属于 B"],
            "ingredient": ["i1", "i2", "i3", "i4", "i5"],
            "analysis": ["an"],
            "price": ["pr"],
            "total": ["to"]
        }"#;
        let lib = ContentLibrary::from_json(raw).unwrap();
        assert_eq!(lib.system().len(), 2);
        assert_eq!(lib.ingredient().len(), 5);
        assert_eq!(lib.total()[0], "to");
    }

    #[test]
    fn test_from_json_validates_minimums() {
        let raw = r#"{
            "system": ["only"],
            "ingredient": ["i1", "i2", "i3", "i4"],
            "analysis": ["an"],
            "price": ["pr"],
            "total": ["to"]
        }"#;
        assert!(ContentLibrary::from_json(raw).is_err());
    }
}

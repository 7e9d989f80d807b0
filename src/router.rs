//! 分区路由：路由字符串（`#summary` 等）与分区之间的映射

use crate::keys;
use crate::models::Section;
use crate::store::Store;

/// 解析路由，未知或空路由回落到仪表盘
pub fn resolve(route: &str) -> Section {
    let route = if route.is_empty() { "#dashboard" } else { route };
    match route {
        "#dashboard" => Section::Dashboard,
        "#summary" => Section::Summary,
        "#detail" => Section::Detail,
        "#checklist" => Section::Checklist,
        _ => Section::Dashboard,
    }
}

pub fn route_of(section: Section) -> String {
    format!("#{}", section.as_str())
}

/// 按路由切换分区
pub fn route(store: &Store, route: &str) {
    navigate(store, resolve(route));
}

/// 切换分区（写入存储，由订阅者负责重绘）
pub fn navigate(store: &Store, section: Section) {
    tracing::debug!(route = %route_of(section), "切换分区");
    store.set_typed(keys::SECTION, &section);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_routes() {
        assert_eq!(resolve("#summary"), Section::Summary);
        assert_eq!(resolve("#checklist"), Section::Checklist);
        assert_eq!(resolve(""), Section::Dashboard);
        assert_eq!(resolve("#unknown"), Section::Dashboard);
    }

    #[test]
    fn test_route_round_trip_for_all_sections() {
        for section in Section::ALL {
            assert_eq!(resolve(&route_of(section)), section);
        }
    }

    #[test]
    fn test_navigate_writes_store() {
        let store = keys::initial_store();
        route(&store, "#detail");
        assert_eq!(store.get_typed(keys::SECTION), Some(Section::Detail));
    }
}

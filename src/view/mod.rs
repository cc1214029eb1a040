//! 展示层绑定
//!
//! 把 `NotificationStore` / `SyncController` 的状态转换为 UI 可直接渲染的视图模型。
//! 视图只读存储；所有修改通过控制器完成。

pub mod bell;
pub mod card;
pub mod detail;
pub mod dropdown;
pub mod format;
pub mod icon;
pub mod image;
pub mod panel;
pub mod toast;

pub use bell::BellBadge;
pub use card::NotificationCard;
pub use detail::DetailView;
pub use dropdown::DropdownView;
pub use icon::{icon_for, Icon};
pub use image::VehicleImageResolver;
pub use panel::PanelView;
pub use toast::{Toast, ToastQueue};

use chrono::Utc;

use crate::notification::NotificationFilter;
use crate::sync::SyncController;

/// 从控制器生成视图的便捷方法
pub struct ViewBinder {
    images: VehicleImageResolver,
    dropdown_size: usize,
}

impl ViewBinder {
    pub fn new(dropdown_size: usize) -> Self {
        Self {
            images: VehicleImageResolver::new(),
            dropdown_size,
        }
    }

    pub fn images(&self) -> &VehicleImageResolver {
        &self.images
    }

    pub fn badge(&self, controller: &SyncController) -> BellBadge {
        BellBadge::new(controller.unread_count(), controller.state())
    }

    pub fn dropdown(&self, controller: &SyncController) -> DropdownView {
        let now = Utc::now();
        controller.with_store(|store| DropdownView::build(store, self.dropdown_size, &self.images, now))
    }

    pub fn panel(&self, controller: &SyncController, filter: &NotificationFilter) -> PanelView {
        let now = Utc::now();
        controller.with_store(|store| PanelView::build(store, filter, &self.images, now))
    }

    /// 本地已有记录的详情
    pub fn detail(&self, controller: &SyncController, id: &str) -> Option<DetailView> {
        controller.with_store(|store| store.get(id).map(|n| DetailView::build(n, &self.images)))
    }
}

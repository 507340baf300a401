mod article;
mod shop_item;
mod stock;
mod subscription;

pub use article::*;
pub use shop_item::*;
pub use stock::*;
pub use subscription::*;

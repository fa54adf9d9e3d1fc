use redis::Script;
use std::sync::LazyLock;

pub const PUT_ITEM_SCRIPT_BODY: &str = include_str!("../../lua/put_item.lua");
pub const UPDATE_ITEM_SCRIPT_BODY: &str = include_str!("../../lua/update_item.lua");
pub const DELETE_ITEM_SCRIPT_BODY: &str = include_str!("../../lua/delete_item.lua");
pub const SCAN_TABLE_SCRIPT_BODY: &str = include_str!("../../lua/scan_table.lua");
pub const DELETE_TABLE_SCRIPT_BODY: &str = include_str!("../../lua/delete_table.lua");

pub static PUT_ITEM_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(PUT_ITEM_SCRIPT_BODY));
pub static UPDATE_ITEM_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(UPDATE_ITEM_SCRIPT_BODY));
pub static DELETE_ITEM_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(DELETE_ITEM_SCRIPT_BODY));
pub static SCAN_TABLE_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(SCAN_TABLE_SCRIPT_BODY));
pub static DELETE_TABLE_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(DELETE_TABLE_SCRIPT_BODY));

pub mod iops_panel;
pub mod lun_table;

pub use iops_panel::render_iops_panel;
pub use lun_table::render_lun_table;

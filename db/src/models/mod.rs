pub mod command;
pub mod device;
pub mod metric;
pub mod metric_field;
pub mod reading;
pub mod reading_value;

pub use command::Entity as Command;
pub use device::Entity as Device;
pub use metric::Entity as Metric;
pub use metric_field::Entity as MetricField;
pub use reading::Entity as Reading;
pub use reading_value::Entity as ReadingValue;

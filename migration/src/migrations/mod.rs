pub mod m202610180001_create_devices;
pub mod m202610180002_create_metrics;
pub mod m202610180003_create_metric_fields;
pub mod m202610180004_create_readings;
pub mod m202610180005_create_reading_values;
pub mod m202610180006_create_commands;

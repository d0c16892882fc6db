#[derive(Debug, Clone)]
pub struct StationConfig {
    pub tick_rate: u32,
    pub ticks: u32,
    pub sensor_count: usize,
    pub sensor_spacing: f32,
    pub wireless_range: f32,
    pub button_interval: u32,
    pub sensor_interval: u32,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            tick_rate: 10,
            ticks: 40,
            sensor_count: 3,
            sensor_spacing: 4.0,
            wireless_range: 10.0,
            button_interval: 5,
            sensor_interval: 4,
        }
    }
}

/// The largest attenuation an FM operator total level accepts.
pub const MAX_ATTENUATION: u8 = 63;

/// Converts a MIDI velocity into an operator attenuation.
///
/// The curve is quadratic, so soft notes fall off quickly while loud notes
/// stay close to full level. Velocities above 127 are treated as 127.
pub fn attenuation(velocity: u8) -> u8 {
    let v = 1.0 - velocity.min(127) as f64 / 127.0;
    (v * v * MAX_ATTENUATION as f64) as u8
}

/// Gets the attenuation for every MIDI velocity.
pub fn velocity_curve() -> [u8; 128] {
    core::array::from_fn(|i| attenuation(i as u8))
}

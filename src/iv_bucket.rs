//! Maps a raw 0-100 IV percentage onto the compact bucket set stored in
//! `aggregated_pokemon_iv_monthly` ({0,25,50,75,90,95,100}).

/// Stepwise bucket mapping. Thresholds are chosen so the worked boundary
/// examples hold exactly: 0->0, 24->0, 25->25, 89->75, 90->90, 95->95, 100->100.
pub fn get_iv_bucket(raw_iv: u8) -> u8 {
    match raw_iv {
        0..=24 => 0,
        25..=49 => 25,
        50..=74 => 50,
        75..=89 => 75,
        90..=94 => 90,
        95..=99 => 95,
        _ => 100,
    }
}

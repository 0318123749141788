use rand::seq::SliceRandom;
use rand::Rng;

pub const QUOTES: [&str; 5] = [
    "The only way to do great work is to love what you do. - Steve Jobs",
    "Innovation distinguishes between a leader and a follower. - Steve Jobs",
    "Believe you can and you're halfway there. - Theodore Roosevelt",
    "The future belongs to those who believe in the beauty of their dreams. - Eleanor Roosevelt",
    "Success is not final, failure is not fatal: It is the courage to continue that counts. - Winston Churchill",
];

/// Picks a quote to show beside a bot entry. Called on every render, so the
/// same turn may show a different quote each time the page is drawn.
pub fn pick_quote<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    QUOTES.choose(rng).copied().unwrap_or(QUOTES[0])
}

mod entropy_quality;
mod zeroize_on_drop;

pub mod renko_scalper;

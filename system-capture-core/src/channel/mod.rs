pub mod sample_channel;

pub mod ffmpeg_cli_transcoder;
pub mod wav_codec;

pub mod shared {
    pub mod constants;
    pub mod sample_segment;
    pub mod time_segment;
}

pub mod audio {
    pub mod domain {
        pub mod pcm_codec;
        pub mod signal;
        pub mod transcoder;
    }
    pub mod infrastructure;
}

pub mod speech {
    pub mod domain {
        pub mod segment_reverser;
        pub mod speech_segmenter;
        pub mod speech_segmenter_config;
    }
}

pub mod analysis {
    pub mod domain {
        pub mod analysis_record;
        pub mod analysis_store;
        pub mod feature_extractor;
        pub mod feature_track;
        pub mod feature_vector;
        pub mod frame_analyzer;
        pub mod normalized_series;
        pub mod redetector;
        pub mod segment_detector;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod analyze_audio_use_case;
    pub mod batch_executor;
    pub mod infrastructure;
    pub mod output_layout;
    pub mod pipeline_logger;
    pub mod record_edit_use_case;
    pub mod redetect_segments_use_case;
    pub mod reverse_audio_use_case;
    pub mod reversed_outputs_use_case;
    pub mod snippet_use_case;
}

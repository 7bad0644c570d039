//! Face-count screening for directories of video files.
//!
//! A video qualifies when enough of its sampled frames contain more than
//! one face. Qualifying videos are copied to an output directory and
//! recorded in an append-only log.

pub mod shared {
    pub mod constants;
    pub mod face_box;
    pub mod frame;
    pub mod video_metadata;
}

pub mod sampling {
    pub mod frame_sampler;
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
    }
    pub mod infrastructure;
}

pub mod video {
    pub mod domain {
        pub mod video_decoder;
    }
    pub mod infrastructure;
}

pub mod screening {
    pub mod domain {
        pub mod batch_summary;
        pub mod log_entry;
        pub mod qualification_policy;
        pub mod video_job;
        pub mod video_outcome;
    }
    pub mod infrastructure;
    pub mod screen_directory_use_case;
    pub mod screen_video_use_case;
    pub mod screening_logger;
}

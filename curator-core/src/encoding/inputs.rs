//! Encoder input slot allocation.
//!
//! Every `-i` of an ffmpeg command is a slot keyed by where the bytes come
//! from and which channel layout the decoder is asked for. A recurring key
//! reuses its slot so the same data is never decoded twice.
//!
//! Only one piped AC-3 intermediate can exist per command since stdin is
//! single. It is carried as Matroska so several streams can share it, and
//! the first request made for it wins; callers that need a stereo decode
//! from a native pipe add an explicit `-ac 2` on the output track.

use std::collections::HashMap;
use std::path::Path;

use crate::media::StreamDescriptor;

/// Where a slot's data is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSource {
    /// The source file itself
    File,
    /// The AC-3 intermediate produced by the first pipeline stage
    Ac3Pipe,
}

/// Channel layout requested from the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRequest {
    Native,
    /// Decoder-side downmix via `-request_channels 2`
    Stereo,
}

/// Resolved reference to a stream inside an allocated slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRef {
    /// Input position (`N` in `-map N:M`)
    pub input: usize,
    /// Stream position inside that input (`M` in `-map N:M`)
    pub stream: u32,
    /// Layout the slot actually decodes with
    pub request: ChannelRequest,
}

impl SlotRef {
    pub fn map_spec(&self) -> String {
        format!("{}:{}", self.input, self.stream)
    }

    /// Whether the output track still needs an explicit stereo downmix.
    pub fn needs_output_downmix(&self, wanted: ChannelRequest) -> bool {
        wanted == ChannelRequest::Stereo && self.request == ChannelRequest::Native
    }
}

/// Allocator of input slots for one ffmpeg command.
#[derive(Debug, Default)]
pub struct InputSlots {
    slots: Vec<(InputSource, ChannelRequest)>,
    pipe_slot: Option<usize>,
    /// Source stream indices carried by the AC-3 pipe, in pipe order
    pipe_streams: Vec<u32>,
    by_key: HashMap<(InputSource, ChannelRequest), usize>,
}

impl InputSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot reference for source stream `stream_index` read from
    /// `source` with `request`.
    pub fn reference(
        &mut self,
        stream_index: u32,
        source: InputSource,
        request: ChannelRequest,
    ) -> SlotRef {
        match source {
            InputSource::File => {
                let input = self.slot_for(source, request);
                SlotRef {
                    input,
                    stream: stream_index,
                    request,
                }
            }
            InputSource::Ac3Pipe => {
                let input = match self.pipe_slot {
                    Some(input) => input,
                    None => {
                        let input = self.slot_for(source, request);
                        self.pipe_slot = Some(input);
                        input
                    }
                };
                let position = match self.pipe_streams.iter().position(|&i| i == stream_index) {
                    Some(position) => position,
                    None => {
                        self.pipe_streams.push(stream_index);
                        self.pipe_streams.len() - 1
                    }
                };
                SlotRef {
                    input,
                    stream: position as u32,
                    request: self.slots[input].1,
                }
            }
        }
    }

    fn slot_for(&mut self, source: InputSource, request: ChannelRequest) -> usize {
        if let Some(&input) = self.by_key.get(&(source, request)) {
            return input;
        }
        let input = self.slots.len();
        self.slots.push((source, request));
        self.by_key.insert((source, request), input);
        input
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn uses_pipe(&self) -> bool {
        self.pipe_slot.is_some()
    }

    /// Source stream indices the AC-3 stage must emit, in pipe order.
    pub fn pipe_streams(&self) -> &[u32] {
        &self.pipe_streams
    }

    /// Renders the `-i` arguments of every slot in allocation order.
    pub fn input_args(&self, source: &Path) -> Vec<String> {
        let mut args = Vec::new();
        for (slot_source, request) in &self.slots {
            if *slot_source == InputSource::Ac3Pipe {
                args.extend(["-f".to_string(), "matroska".to_string()]);
            }
            if *request == ChannelRequest::Stereo {
                args.extend(["-request_channels".to_string(), "2".to_string()]);
            }
            args.push("-i".to_string());
            args.push(match slot_source {
                InputSource::File => source.to_string_lossy().into_owned(),
                InputSource::Ac3Pipe => "-".to_string(),
            });
        }
        args
    }
}

/// Slot a final-encode audio track is read from.
///
/// Multichannel AAC always goes through the AC-3 pipe; other multichannel
/// streams are downmixed by the decoder when converted.
pub fn encode_source(stream: &StreamDescriptor, convert: bool) -> (InputSource, ChannelRequest) {
    let request = if convert && !stream.is_stereo_or_less() {
        ChannelRequest::Stereo
    } else {
        ChannelRequest::Native
    };
    let source = if stream.is_multichannel_aac() {
        InputSource::Ac3Pipe
    } else {
        InputSource::File
    };
    (source, request)
}

/// Slot a loudness measurement reads `stream` from.
///
/// Multichannel streams are measured on their stereo downmix, which is
/// what the converted output track will carry.
pub fn measurement_source(stream: &StreamDescriptor) -> (InputSource, ChannelRequest) {
    encode_source(stream, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recurring_key_reuses_slot() {
        let mut slots = InputSlots::new();
        let first = slots.reference(1, InputSource::File, ChannelRequest::Native);
        let second = slots.reference(2, InputSource::File, ChannelRequest::Native);
        assert_eq!(first.input, second.input);
        assert_eq!(second.map_spec(), "0:2");
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn test_distinct_requests_get_distinct_slots() {
        let mut slots = InputSlots::new();
        let native = slots.reference(1, InputSource::File, ChannelRequest::Native);
        let stereo = slots.reference(1, InputSource::File, ChannelRequest::Stereo);
        assert_eq!(native.input, 0);
        assert_eq!(stereo.input, 1);
        assert_eq!(
            slots.input_args(Path::new("in.mkv")),
            vec!["-i", "in.mkv", "-request_channels", "2", "-i", "in.mkv"]
        );
    }

    #[test]
    fn test_single_pipe_slot_with_positions() {
        let mut slots = InputSlots::new();
        let a = slots.reference(2, InputSource::Ac3Pipe, ChannelRequest::Native);
        let b = slots.reference(4, InputSource::Ac3Pipe, ChannelRequest::Stereo);
        let again = slots.reference(2, InputSource::Ac3Pipe, ChannelRequest::Stereo);

        assert_eq!(a.input, b.input);
        assert_eq!((a.stream, b.stream, again.stream), (0, 1, 0));
        assert!(b.needs_output_downmix(ChannelRequest::Stereo));
        assert_eq!(slots.pipe_streams(), &[2, 4]);
        assert_eq!(slots.len(), 1);
        assert_eq!(
            slots.input_args(Path::new("in.mkv")),
            vec!["-f", "matroska", "-i", "-"]
        );
    }

    #[test]
    fn test_source_rules() {
        let aac51 = StreamDescriptor::audio(1, "aac", 6, None);
        let dts = StreamDescriptor::audio(2, "dts", 6, None);
        let stereo = StreamDescriptor::audio(3, "aac", 2, None);

        assert_eq!(
            measurement_source(&aac51),
            (InputSource::Ac3Pipe, ChannelRequest::Stereo)
        );
        assert_eq!(
            measurement_source(&dts),
            (InputSource::File, ChannelRequest::Stereo)
        );
        assert_eq!(
            measurement_source(&stereo),
            (InputSource::File, ChannelRequest::Native)
        );
        assert_eq!(
            encode_source(&dts, false),
            (InputSource::File, ChannelRequest::Native)
        );
    }
}

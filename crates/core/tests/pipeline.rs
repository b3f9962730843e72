//! End-to-end send → receive pipelines through the public API.

use std::time::Duration;

use rtpav::media::Packetizer;
use rtpav::media::audio::{AudioCodecType, AudioDecoder};
use rtpav::media::g711::{G711Codec, G711Law};
use rtpav::media::h264::{
    H264Depacketizer, H264Packetizer, NaluType, PacketizationMode, PacketizationType, START_CODE,
};
use rtpav::{
    AudioReceiver, AudioSender, AudioSenderConfig, EncodedImage, H264FrameAssembler,
    H264VideoSender, PayloadSizeLimits, RtpPacket, SsrcRegistry, VideoRotation, VideoSenderConfig,
};

const SPS: [u8; 8] = [0x67, 0x64, 0x00, 0x28, 0xAC, 0xD9, 0x40, 0x78];
const PPS: [u8; 4] = [0x68, 0xEB, 0xE3, 0xCB];

fn annexb(nals: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for nal in nals {
        out.extend_from_slice(&START_CODE);
        out.extend_from_slice(nal);
    }
    out
}

fn make_nal(header: u8, len: usize) -> Vec<u8> {
    let mut nal = vec![header];
    nal.extend((1..len).map(|i| (i % 251) as u8 + 1));
    nal
}

/// Packetize `access_unit` with sequence numbers counting up from `first_seq`.
fn make_packets(access_unit: &[u8], first_seq: u16) -> Vec<Vec<u8>> {
    let mut packetizer = H264Packetizer::new(
        access_unit,
        PayloadSizeLimits::default(),
        PacketizationMode::NonInterleaved,
    )
    .unwrap();
    let mut packets = Vec::new();
    let mut seq = first_seq;
    while packetizer.num_packets() > 0 {
        let mut packet = RtpPacket::new();
        packet.set_sequence_number(seq);
        packet.set_timestamp(180_000);
        assert!(packetizer.next_packet(&mut packet).unwrap());
        packets.push(packet.into_bytes());
        seq = seq.wrapping_add(1);
    }
    packets
}

#[test]
fn fu_a_frame_roundtrip() {
    let registry = SsrcRegistry::new();
    let mut sender = H264VideoSender::new(VideoSenderConfig::default(), &registry).unwrap();
    let mut assembler = H264FrameAssembler::default();

    let idr = make_nal(0x65, 5000);
    let image = EncodedImage::new(annexb(&[&SPS, &PPS, &idr]), Duration::from_millis(0));
    let packets: Vec<Vec<u8>> = sender.packetize(&image).unwrap().map(|p| p.unwrap()).collect();
    assert!(packets.len() > 2);

    let depacketizer = H264Depacketizer::new();
    let starts = packets
        .iter()
        .flat_map(|bytes| depacketizer.parse(RtpPacket::parse(bytes).unwrap().payload()))
        .filter(|parsed| {
            parsed.packetization == PacketizationType::FuA && parsed.is_first_packet_in_frame
        })
        .count();
    assert_eq!(starts, 1);

    let frames: Vec<_> = packets.iter().filter_map(|p| assembler.received(p)).collect();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data, image.buffer);
    assert_eq!(frames[0].timestamp_ms, 0);
}

#[test]
fn stap_a_keeps_unit_order() {
    let slice = make_nal(0x41, 40);
    let access_unit = annexb(&[&SPS, &PPS, &slice]);
    let packets = make_packets(&access_unit, 0);
    assert_eq!(packets.len(), 1);

    let packet = RtpPacket::parse(&packets[0]).unwrap();
    assert_eq!(packet.payload()[0] & 0x1F, NaluType::StapA as u8);
    let parsed = H264Depacketizer::new().parse(packet.payload());
    let units: Vec<&[u8]> = parsed.iter().map(|p| p.payload.as_slice()).collect();
    assert_eq!(units, vec![&SPS[..], &PPS[..], &slice[..]]);
    assert!(parsed.iter().all(|p| p.packetization == PacketizationType::StapA));
}

#[test]
fn lost_packet_drops_only_its_frame() {
    let registry = SsrcRegistry::new();
    let mut sender = H264VideoSender::new(VideoSenderConfig::default(), &registry).unwrap();
    let mut assembler = H264FrameAssembler::default();

    let key = EncodedImage::new(annexb(&[&SPS, &PPS, &make_nal(0x65, 200)]), Duration::ZERO);
    let delta = EncodedImage::new(annexb(&[&make_nal(0x41, 3000)]), Duration::from_millis(40));
    let next = EncodedImage::new(annexb(&[&make_nal(0x41, 500)]), Duration::from_millis(80));

    let key_packets: Vec<_> = sender.packetize(&key).unwrap().map(|p| p.unwrap()).collect();
    let mut delta_packets: Vec<_> = sender.packetize(&delta).unwrap().map(|p| p.unwrap()).collect();
    let next_packets: Vec<_> = sender.packetize(&next).unwrap().map(|p| p.unwrap()).collect();
    assert_eq!(delta_packets.len(), 3);

    assert!(key_packets.iter().filter_map(|p| assembler.received(p)).count() == 1);
    let lost = delta_packets.remove(1);
    assert!(delta_packets.iter().all(|p| assembler.received(p).is_none()));
    assert!(assembler.received(&lost).is_none());

    let frames: Vec<_> = next_packets.iter().filter_map(|p| assembler.received(p)).collect();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data, next.buffer);
    assert_eq!(frames[0].timestamp_ms, 80);
}

#[test]
fn explicit_gap_versus_consecutive_run() {
    let slice = make_nal(0x41, 3000);
    let access_unit = annexb(&[&slice]);

    let mut assembler = H264FrameAssembler::default();
    for packet in make_packets(&annexb(&[&SPS, &PPS]), 9) {
        assembler.received(&packet);
    }
    let packets = make_packets(&access_unit, 10);
    assert_eq!(packets.len(), 3);
    let mut gap = RtpPacket::parse(&packets[2]).unwrap();
    gap.set_sequence_number(13);
    assert!(assembler.received(&packets[0]).is_none());
    assert!(assembler.received(&packets[1]).is_none());
    assert!(assembler.received(gap.as_bytes()).is_none());

    let mut assembler = H264FrameAssembler::default();
    for packet in make_packets(&annexb(&[&SPS, &PPS]), 9) {
        assembler.received(&packet);
    }
    let frames: Vec<_> = packets.iter().filter_map(|p| assembler.received(p)).collect();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data, access_unit);
}

#[test]
fn reordering_across_sequence_wrap() {
    let idr = make_nal(0x65, 4000);
    let access_unit = annexb(&[&idr]);
    let expected = annexb(&[&SPS, &PPS, &idr]);

    for base in 65_500u16..=65_535 {
        let mut assembler = H264FrameAssembler::default();
        for packet in make_packets(&annexb(&[&SPS, &PPS]), base.wrapping_sub(1)) {
            assert!(assembler.received(&packet).is_none());
        }

        let mut packets = make_packets(&access_unit, base);
        assert_eq!(packets.len(), 4);
        // everything but the marker packet arrives in reverse
        packets[..3].reverse();

        let frames: Vec<_> = packets.iter().filter_map(|p| assembler.received(p)).collect();
        assert_eq!(frames.len(), 1, "base {base}");
        assert_eq!(frames[0].data, expected, "base {base}");
        assert_eq!(assembler.buffered(), 0);
    }
}

#[test]
fn placeholders_until_parameter_sets() {
    let registry = SsrcRegistry::new();
    let mut sender = H264VideoSender::new(VideoSenderConfig::default(), &registry).unwrap();
    let mut assembler = H264FrameAssembler::default();

    let orphan = EncodedImage::new(annexb(&[&make_nal(0x41, 2000)]), Duration::ZERO);
    let frames: Vec<_> = sender
        .packetize(&orphan)
        .unwrap()
        .filter_map(|p| assembler.received(&p.unwrap()))
        .collect();
    assert_eq!(frames.len(), 1);
    assert!(frames[0].is_placeholder());

    let mut key = EncodedImage::new(
        annexb(&[&SPS, &PPS, &make_nal(0x65, 2000)]),
        Duration::from_millis(33),
    );
    key.rotation = VideoRotation::Deg90;
    let frames: Vec<_> = sender
        .packetize(&key)
        .unwrap()
        .filter_map(|p| assembler.received(&p.unwrap()))
        .collect();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data, key.buffer);
    assert_eq!(frames[0].timestamp_ms, 33);
    // no rotation extension configured on the sender
    assert_eq!(frames[0].rotation, VideoRotation::Deg0);
}

#[test]
fn rotation_survives_transport() {
    let registry = SsrcRegistry::new();
    let config = VideoSenderConfig {
        video_rotation: Some(1),
        ..Default::default()
    };
    let mut sender = H264VideoSender::new(config, &registry).unwrap();
    let mut assembler = H264FrameAssembler::default();

    let mut image = EncodedImage::new(annexb(&[&SPS, &PPS, &make_nal(0x65, 3000)]), Duration::ZERO);
    image.rotation = VideoRotation::Deg270;
    let frame = sender
        .packetize(&image)
        .unwrap()
        .filter_map(|p| assembler.received(&p.unwrap()))
        .next()
        .unwrap();
    assert_eq!(frame.rotation, VideoRotation::Deg270);
    assert_eq!(frame.data, image.buffer);
}

#[test]
fn g711_audio_pipeline() {
    let registry = SsrcRegistry::new();
    let config = AudioSenderConfig {
        payload_type: G711Law::MuLaw.payload_type(),
        ..AudioSenderConfig::new(AudioCodecType::G711)
    };
    let codec = Box::new(G711Codec::new(G711Law::MuLaw));
    let mut sender = AudioSender::new(config, codec, &registry).unwrap();
    let mut receiver = AudioReceiver::new(AudioCodecType::G711);
    let mut decoder = G711Codec::new(G711Law::MuLaw);

    let pcm: Vec<u8> = (0..480i16)
        .flat_map(|i| ((i % 40 - 20) * 500).to_le_bytes())
        .collect();
    let input = sender.input();
    input.write(&pcm[..500]);
    input.write(&pcm[500..]);

    let packets = sender.drain().unwrap();
    assert_eq!(packets.len(), 3);

    let mut decoded = Vec::new();
    for (i, bytes) in packets.iter().enumerate() {
        let frame = receiver.received(bytes).unwrap();
        assert_eq!(frame.timestamp_ms, i as u64 * 20);
        decoded.extend(decoder.decode(&frame.data).unwrap());
    }
    assert_eq!(decoded.len(), pcm.len());
    for (original, restored) in pcm.chunks_exact(2).zip(decoded.chunks_exact(2)) {
        let original = i16::from_le_bytes([original[0], original[1]]) as i32;
        let restored = i16::from_le_bytes([restored[0], restored[1]]) as i32;
        assert!((original - restored).abs() <= original.abs() / 16 + 16);
    }
}

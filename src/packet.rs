//! RSP framing: `$<payload>#<checksum>` parsing and generation, ack/nak
//! handling, payload escaping and Ctrl-C detection.
//!
//! Receiving always hands back the most recently pipelined packet; sending
//! retransmits until the host acks with `+` or abandons the exchange by
//! starting a packet of its own.

use crate::buffer::PacketBuffer;
use crate::comm::Comm;
use crate::error::Error;
use crate::hex;

const CTRL_C: u8 = 0x03;

/// Persistent framing state. `last_char` carries a packet-start byte seen
/// while waiting for an ack over to the next receive.
pub(crate) struct Packet {
    last_char: u8,
}

impl Packet {
    pub(crate) fn new() -> Packet {
        Packet { last_char: 0 }
    }
}

fn read_tracked<C: Comm>(packet: &mut Packet, comm: &mut C) -> Result<u8, Error> {
    let character = comm.read().map_err(Error::comm)?;
    packet.last_char = character;
    Ok(character)
}

/// Receives a validated packet into `buffer`.
///
/// On return the buffer window covers exactly the payload with the cursor at
/// its start, and a `+` has been sent for it. Corrupt packets are nak'd and
/// re-awaited; when several packets are already queued on the wire, only the
/// latest one is kept.
pub(crate) fn receive<C: Comm>(
    packet: &mut Packet,
    comm: &mut C,
    buffer: &mut PacketBuffer,
) -> Result<(), Error> {
    loop {
        let (mut calculated, mut expected) = get_packet_data_and_checksum(packet, comm, buffer)?;
        while comm.data_ready().map_err(Error::comm)? {
            let sums = get_packet_data_and_checksum(packet, comm, buffer)?;
            calculated = sums.0;
            expected = sums.1;
        }

        if expected == Some(calculated) {
            comm.write(b'+').map_err(Error::comm)?;
            break;
        }
        error!(
            "bad checksum: computed {:02x}, received {:?}",
            calculated, expected
        );
        comm.write(b'-').map_err(Error::comm)?;
    }

    buffer.set_end();
    buffer.reset();
    trace!("<-- ${}", String::from_utf8_lossy(buffer.contents()));
    Ok(())
}

fn get_packet_data_and_checksum<C: Comm>(
    packet: &mut Packet,
    comm: &mut C,
    buffer: &mut PacketBuffer,
) -> Result<(u8, Option<u8>), Error> {
    let calculated = loop {
        wait_for_start_of_packet(packet, comm)?;
        if let Some(sum) = get_packet_data(packet, comm, buffer)? {
            break sum;
        }
    };

    let hi = hex::hex_char_to_nibble(read_tracked(packet, comm)?).ok();
    let lo = hex::hex_char_to_nibble(read_tracked(packet, comm)?).ok();
    let expected = match (hi, lo) {
        (Some(hi), Some(lo)) => Some((hi << 4) | lo),
        _ => None,
    };
    Ok((calculated, expected))
}

fn wait_for_start_of_packet<C: Comm>(packet: &mut Packet, comm: &mut C) -> Result<(), Error> {
    let mut character = packet.last_char;
    packet.last_char = 0;
    while character != b'$' {
        character = read_tracked(packet, comm)?;
    }
    Ok(())
}

/// Accumulates payload bytes, summing them modulo 256. Returns the checksum
/// once `#` terminates the packet; `None` when a stray `$` restarts
/// accumulation or an oversized packet ran the buffer full.
fn get_packet_data<C: Comm>(
    packet: &mut Packet,
    comm: &mut C,
    buffer: &mut PacketBuffer,
) -> Result<Option<u8>, Error> {
    buffer.reset();
    let mut checksum = 0u8;
    let mut character = read_tracked(packet, comm)?;
    while buffer.bytes_left() > 0 && character != b'$' && character != b'#' {
        checksum = checksum.wrapping_add(character);
        let _ = buffer.write_char(character);
        character = read_tracked(packet, comm)?;
    }

    Ok(if character == b'#' { Some(checksum) } else { None })
}

fn needs_escaping(byte: u8) -> bool {
    byte == b'$' || byte == b'#' || byte == b'}' || byte == b'*'
}

/// Sends the buffer contents framed and escaped, retransmitting on nak.
///
/// Returns whether a Ctrl-C byte was observed while waiting for the ack; the
/// semihost completion path consults that. A `$` instead of an ack means the
/// host gave up on this response and is sending a new packet, which is left
/// for the next receive.
pub(crate) fn send<C: Comm>(
    packet: &mut Packet,
    comm: &mut C,
    buffer: &mut PacketBuffer,
) -> Result<bool, Error> {
    let mut ctrl_c_seen = false;
    loop {
        send_frame(comm, buffer)?;

        let reply = loop {
            let character = read_tracked(packet, comm)?;
            if character == CTRL_C {
                ctrl_c_seen = true;
                continue;
            }
            break character;
        };
        match reply {
            b'+' => {
                packet.last_char = 0;
                return Ok(ctrl_c_seen);
            }
            b'$' => return Ok(ctrl_c_seen),
            _ => debug!("response nak'd, retransmitting"),
        }
    }
}

fn send_frame<C: Comm>(comm: &mut C, buffer: &mut PacketBuffer) -> Result<(), Error> {
    buffer.reset();
    let mut checksum = 0u8;

    comm.write(b'$').map_err(Error::comm)?;
    for &byte in buffer.contents() {
        if needs_escaping(byte) {
            let escaped = byte ^ 0x20;
            comm.write(b'}').map_err(Error::comm)?;
            comm.write(escaped).map_err(Error::comm)?;
            checksum = checksum.wrapping_add(b'}').wrapping_add(escaped);
        } else {
            comm.write(byte).map_err(Error::comm)?;
            checksum = checksum.wrapping_add(byte);
        }
    }
    comm.write(b'#').map_err(Error::comm)?;
    comm.write_hex(checksum).map_err(Error::comm)?;

    trace!(
        "--> ${}#{:02x}",
        String::from_utf8_lossy(buffer.contents()),
        checksum
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    struct ScriptedComm {
        input: VecDeque<u8>,
        output: Vec<u8>,
    }

    impl ScriptedComm {
        fn new(input: &[u8]) -> ScriptedComm {
            ScriptedComm {
                input: input.iter().cloned().collect(),
                output: Vec::new(),
            }
        }
    }

    impl Comm for ScriptedComm {
        type Error = io::Error;

        fn read(&mut self) -> io::Result<u8> {
            self.input
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted"))
        }

        fn write(&mut self, byte: u8) -> io::Result<()> {
            self.output.push(byte);
            Ok(())
        }

        fn data_ready(&mut self) -> io::Result<bool> {
            Ok(!self.input.is_empty())
        }
    }

    fn checksum(payload: &[u8]) -> u8 {
        payload.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
    }

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut wire = vec![b'$'];
        wire.extend_from_slice(payload);
        wire.push(b'#');
        wire.extend_from_slice(format!("{:02x}", checksum(payload)).as_bytes());
        wire
    }

    fn receive_into(comm: &mut ScriptedComm, size: usize) -> PacketBuffer {
        let mut packet = Packet::new();
        let mut buffer = PacketBuffer::new(size);
        receive(&mut packet, comm, &mut buffer).unwrap();
        buffer
    }

    #[test]
    fn valid_packet_is_acked_and_positioned_for_reading() {
        let mut comm = ScriptedComm::new(&framed(b"m1234,4"));
        let buffer = receive_into(&mut comm, 64);
        assert_eq!(comm.output, b"+");
        assert_eq!(buffer.remaining(), b"m1234,4");
    }

    #[test]
    fn bad_checksum_is_nakd_then_retransmission_accepted() {
        let mut wire = b"$ab#00".to_vec();
        wire.extend_from_slice(&framed(b"ab"));
        let mut comm = ScriptedComm::new(&wire);
        let buffer = receive_into(&mut comm, 64);
        assert_eq!(comm.output, b"-+");
        assert_eq!(buffer.remaining(), b"ab");
    }

    #[test]
    fn leading_noise_and_ctrl_c_are_skipped() {
        let mut wire = b"\x03noise+".to_vec();
        wire.extend_from_slice(&framed(b"?"));
        let mut comm = ScriptedComm::new(&wire);
        let buffer = receive_into(&mut comm, 64);
        assert_eq!(buffer.remaining(), b"?");
    }

    #[test]
    fn pipelined_packets_answer_only_the_latest() {
        let mut wire = framed(b"first");
        wire.extend_from_slice(&framed(b"second"));
        let mut comm = ScriptedComm::new(&wire);
        let buffer = receive_into(&mut comm, 64);
        assert_eq!(comm.output, b"+");
        assert_eq!(buffer.remaining(), b"second");
    }

    #[test]
    fn stray_start_restarts_accumulation() {
        let mut wire = b"$ab".to_vec();
        wire.extend_from_slice(&framed(b"cd"));
        let mut comm = ScriptedComm::new(&wire);
        let buffer = receive_into(&mut comm, 64);
        assert_eq!(buffer.remaining(), b"cd");
    }

    #[test]
    fn oversized_packet_is_dropped_and_next_one_taken() {
        let mut wire = framed(b"way too long to fit");
        wire.extend_from_slice(&framed(b"ok"));
        let mut comm = ScriptedComm::new(&wire);
        let buffer = receive_into(&mut comm, 4);
        assert_eq!(buffer.remaining(), b"ok");
    }

    fn send_buffer(comm: &mut ScriptedComm, payload: &[u8]) -> bool {
        let mut packet = Packet::new();
        let mut buffer = PacketBuffer::new(payload.len().max(1));
        buffer.write_bytes(payload).unwrap();
        buffer.set_end();
        send(&mut packet, comm, &mut buffer).unwrap()
    }

    #[test]
    fn send_frames_payload_with_checksum() {
        let mut comm = ScriptedComm::new(b"+");
        let ctrl_c = send_buffer(&mut comm, b"OK");
        assert!(!ctrl_c);
        assert_eq!(comm.output, framed(b"OK"));
    }

    #[test]
    fn send_escapes_reserved_bytes() {
        let mut comm = ScriptedComm::new(b"+");
        send_buffer(&mut comm, b"a$b#c}d*e");

        let expected_payload = b"a}\x04b}\x03c}]d}\x0ae";
        assert_eq!(comm.output, framed(expected_payload));

        let body = &comm.output[1..comm.output.len() - 3];
        let mut index = 0;
        while index < body.len() {
            match body[index] {
                b'$' | b'#' | b'*' => panic!("unescaped reserved byte on the wire"),
                b'}' => index += 2,
                _ => index += 1,
            }
        }
    }

    #[test]
    fn send_retransmits_on_nak() {
        let mut comm = ScriptedComm::new(b"-+");
        send_buffer(&mut comm, b"OK");
        let mut expected = framed(b"OK");
        expected.extend_from_slice(&framed(b"OK"));
        assert_eq!(comm.output, expected);
    }

    #[test]
    fn send_records_ctrl_c_while_waiting_for_ack() {
        let mut comm = ScriptedComm::new(b"\x03+");
        assert!(send_buffer(&mut comm, b"OK"));
    }

    #[test]
    fn send_abandons_retransmit_when_host_starts_new_packet() {
        let mut comm = ScriptedComm::new(b"$");
        let mut packet = Packet::new();
        let mut buffer = PacketBuffer::new(2);
        buffer.write_bytes(b"OK").unwrap();
        buffer.set_end();
        send(&mut packet, &mut comm, &mut buffer).unwrap();
        assert_eq!(packet.last_char, b'$');
    }
}

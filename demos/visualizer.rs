use piano_strings::{post::ButterworthLowPass, AudioBuffer, Config, Piano};

fn main() {
    env_logger::init();

    let cfg = Config {
        sample_rate: 8000.0,
        seed: Some(1),
        ..Default::default()
    };
    let mut piano = Piano::new(cfg, ButterworthLowPass::new(2000.0, 4).unwrap(), 1).unwrap();

    let mut out_buf = AudioBuffer::new(1, 256);

    piano.note_on(57, 0.8);
    piano.render(&mut out_buf, 0, 128);
    piano.note_off(57, true);
    piano.render(&mut out_buf, 128, 128);

    for sample in out_buf.channel(0) {
        // construct a waveform
        let width = 80;
        let zero = width / 2;
        let amp = (sample * zero as f32) as i32;
        let mut wave = String::new();
        for i in 0..width {
            if i == zero {
                wave.push('|');
            } else if i == zero + amp {
                wave.push('+');
            } else {
                wave.push(' ');
            }
        }
        println!("{}", wave);
    }
}

use image::{Rgb, RgbImage};
use url::Url;

use kanjian::{
  FromUrl,
  frame::RgbFrame,
  input::InputWrapper,
  model::{Model, Replay, ReplayBuilder},
  output::{OutputWrapper, SaveImageFileOutput},
  overlay::{CameraFacing, OverlayConfig, OverlaySet, Viewport},
  pipeline::{DetectionPipeline, PassOutcome},
  task::{ContinuousTask, OneShotTask, Task},
};

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const CUP: &str = r#"[{"class": "cup", "score": 0.83, "bbox": [100, 50, 60, 40]}]"#;

fn url(scheme: &str, path: &std::path::Path) -> Url {
  Url::parse(&format!("{}://{}", scheme, path.display())).unwrap()
}

fn setup(dir: &std::path::Path) -> (Url, Url) {
  let photo = dir.join("photo.png");
  RgbImage::new(800, 600).save(&photo).unwrap();
  let recording = dir.join("detections.json");
  std::fs::write(&recording, CUP).unwrap();
  (url("image", &photo), url("replay", &recording))
}

fn run_oneshot(facing: CameraFacing) -> RgbImage {
  let dir = tempfile::tempdir().unwrap();
  let (input_url, model_url) = setup(dir.path());
  let out_path = dir.path().join("out").join("overlay.png");

  let input = InputWrapper::<640, 480>::from_url(&input_url).unwrap();
  let model: Replay<RgbFrame<640, 480>> =
    ReplayBuilder::from_url(&model_url).unwrap().build().unwrap();
  let output = SaveImageFileOutput::from_url(&url("image", &out_path)).unwrap();
  let pipeline = DetectionPipeline::new(
    OverlayConfig::default(),
    Viewport::new(320.0, 240.0),
    facing,
  );

  OneShotTask::new(pipeline)
    .run_task(input, model, output)
    .unwrap();

  image::open(&out_path).unwrap().to_rgb8()
}

#[test]
fn oneshot_front_draws_box_at_scaled_position() {
  let image = run_oneshot(CameraFacing::Front);
  assert_eq!(image.dimensions(), (320, 240));
  assert_eq!(image.get_pixel(50, 25), &GREEN);
  assert_eq!(image.get_pixel(79, 44), &GREEN);
  assert_eq!(image.get_pixel(240, 25), &Rgb([0, 0, 0]));
}

#[test]
fn oneshot_back_draws_mirrored_box() {
  let image = run_oneshot(CameraFacing::Back);
  assert_eq!(image.get_pixel(240, 25), &GREEN);
  assert_eq!(image.get_pixel(50, 25), &Rgb([0, 0, 0]));
}

#[test]
fn folder_input_yields_images_in_name_order() {
  let dir = tempfile::tempdir().unwrap();
  RgbImage::from_pixel(10, 10, Rgb([200, 0, 0]))
    .save(dir.path().join("b.png"))
    .unwrap();
  RgbImage::from_pixel(10, 10, Rgb([0, 0, 200]))
    .save(dir.path().join("a.png"))
    .unwrap();
  std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

  let frames: Vec<RgbFrame<32, 24>> = InputWrapper::<32, 24>::from_url(&url("folder", dir.path()))
    .unwrap()
    .collect();
  assert_eq!(frames.len(), 2);
  assert_eq!(frames[0].image().dimensions(), (32, 24));
  assert_eq!(frames[0].image().get_pixel(16, 12), &Rgb([0, 0, 200]));
  assert_eq!(frames[1].image().get_pixel(16, 12), &Rgb([200, 0, 0]));
}

#[test]
fn unknown_schemes_are_rejected() {
  assert!(InputWrapper::<640, 480>::from_url(&Url::parse("rtsp://camera/stream").unwrap()).is_err());
  assert!(OutputWrapper::from_url(&Url::parse("rtsp://camera/stream").unwrap()).is_err());
}

#[test]
fn directory_record_writes_overlay_json() {
  let dir = tempfile::tempdir().unwrap();
  let (_, model_url) = setup(dir.path());
  let frames_dir = dir.path().join("frames");
  std::fs::create_dir(&frames_dir).unwrap();
  for name in ["1.png", "2.png"] {
    RgbImage::new(64, 48).save(frames_dir.join(name)).unwrap();
  }
  let record_dir = dir.path().join("record");
  let output_url = Url::parse(&format!("folder://{}?record", record_dir.display())).unwrap();

  let input = InputWrapper::<640, 480>::from_url(&url("folder", &frames_dir)).unwrap();
  let model: Replay<RgbFrame<640, 480>> =
    ReplayBuilder::from_url(&model_url).unwrap().build().unwrap();
  let output = OutputWrapper::from_url(&output_url).unwrap();
  let pipeline = DetectionPipeline::new(
    OverlayConfig::default(),
    Viewport::new(320.0, 240.0),
    CameraFacing::Back,
  );

  ContinuousTask::new(pipeline)
    .run_task(input, model, output)
    .unwrap();

  let mut records = Vec::new();
  let mut stack = vec![record_dir];
  while let Some(path) = stack.pop() {
    for entry in std::fs::read_dir(path).unwrap() {
      let path = entry.unwrap().path();
      if path.is_dir() {
        stack.push(path);
      } else if path.extension().is_some_and(|e| e == "json") {
        records.push(path);
      }
    }
  }
  assert_eq!(records.len(), 2);

  let overlay: OverlaySet = serde_json::from_slice(&std::fs::read(&records[0]).unwrap()).unwrap();
  assert_eq!(overlay.facing, CameraFacing::Back);
  assert_eq!(overlay.items.len(), 1);
  assert_eq!(overlay.items[0].rect.x, 240.0);
  assert_eq!(overlay.items[0].label_text, "cup (83%)");
}

#[test]
fn slow_pass_is_dropped_when_newer_pass_started() {
  let dir = tempfile::tempdir().unwrap();
  let (input_url, model_url) = setup(dir.path());
  let frame = InputWrapper::<640, 480>::from_url(&input_url)
    .unwrap()
    .next()
    .unwrap();
  let model: Replay<RgbFrame<640, 480>> =
    ReplayBuilder::from_url(&model_url).unwrap().build().unwrap();
  let pipeline = DetectionPipeline::new(
    OverlayConfig::default(),
    Viewport::new(640.0, 480.0),
    CameraFacing::Front,
  );

  let slow = pipeline.begin_pass();
  let slow_result = model.infer(&frame).unwrap();
  // 慢推理尚未应用时用户发起了新的检测
  let outcome = pipeline.run_pass(&model, &frame).unwrap();
  assert_eq!(outcome, PassOutcome::Applied);
  assert_eq!(pipeline.complete(&slow, &slow_result), PassOutcome::Discarded);
  assert_eq!(pipeline.current().unwrap().items.len(), 1);
}

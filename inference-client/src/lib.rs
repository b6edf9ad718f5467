use anyhow::{anyhow, bail, ensure, Context};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, GrayImage, ImageFormat};
use reqwest::Client;
use room_estimator::collaborators::{DepthEstimator, FloorSegmenter, ObjectDetector, SceneClassifier};
use room_estimator::depth::DepthMap;
use room_estimator::{Collaborators, Detection};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const INFERENCE_URL_ENV: &str = "INFERENCE_URL";
pub const INFERENCE_TIMEOUT_ENV: &str = "INFERENCE_TIMEOUT_SECS";
pub const DEFAULT_INFERENCE_URL: &str = "http://127.0.0.1:8001";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Crack model threshold; cracks are faint, so this sits well below the
/// object detector's default
pub const CRACK_MIN_CONFIDENCE: f64 = 0.15;

/// HTTP client for the model sidecar (object/crack detection, depth,
/// segmentation, zero-shot scene classification)
pub struct InferenceClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    image: &'a str,
}

#[derive(Debug, Serialize)]
struct CrackRequest<'a> {
    image: &'a str,
    min_confidence: f64,
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    image: &'a str,
    labels: &'a [&'a str],
}

/// Detector-native box: `[x1, y1, x2, y2]`
#[derive(Debug, Clone, Deserialize)]
struct RawDetection {
    label: String,
    confidence: f64,
    bbox: [f64; 4],
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    detections: Vec<RawDetection>,
}

#[derive(Debug, Deserialize)]
struct DepthResponse {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct SegmentResponse {
    width: u32,
    height: u32,
    classes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    probabilities: Vec<f64>,
}

impl InferenceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create from `INFERENCE_URL` / `INFERENCE_TIMEOUT_SECS`
    pub fn from_env() -> anyhow::Result<Self> {
        let base_url =
            std::env::var(INFERENCE_URL_ENV).unwrap_or_else(|_| DEFAULT_INFERENCE_URL.to_string());
        let timeout_secs = match std::env::var(INFERENCE_TIMEOUT_ENV) {
            Ok(raw) => raw.trim().parse::<u64>().with_context(|| {
                format!("{} must be a whole number of seconds, got '{}'", INFERENCE_TIMEOUT_ENV, raw)
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        info!("Inference sidecar at {} (timeout {}s)", base_url, timeout_secs);
        Self::new(base_url, Duration::from_secs(timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One client behind all four analyzer collaborators
    pub fn into_collaborators(self) -> Collaborators {
        let client = Arc::new(self);
        Collaborators {
            detector: client.clone(),
            depth: client.clone(),
            segmenter: client.clone(),
            classifier: client,
        }
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> anyhow::Result<R>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!("Inference API error on /{}: {} - {}", endpoint, status, error_text);
            bail!("Inference API error on /{}: {} - {}", endpoint, status, error_text);
        }

        response
            .json::<R>()
            .await
            .with_context(|| format!("Malformed response from {}", url))
    }
}

/// PNG-encode and base64 an image for the wire
fn encode_image(image: &DynamicImage) -> anyhow::Result<String> {
    let mut buf = Cursor::new(Vec::new());
    image
        .to_rgb8()
        .write_to(&mut buf, ImageFormat::Png)
        .context("Failed to encode image as PNG")?;
    Ok(general_purpose::STANDARD.encode(buf.into_inner()))
}

fn into_detections(response: DetectResponse, is_crack: bool) -> Vec<Detection> {
    response
        .detections
        .into_iter()
        .filter(|d| d.confidence.is_finite() && d.bbox.iter().all(|v| v.is_finite()))
        .map(|d| {
            let detection = Detection::from_corners(d.label, d.confidence, d.bbox, false);
            if is_crack {
                Detection::crack(detection.confidence, detection.bbox)
            } else {
                detection
            }
        })
        .collect()
}

fn into_depth_map(response: DepthResponse) -> anyhow::Result<DepthMap> {
    let DepthResponse { width, height, values } = response;
    ensure!(
        values.len() == width as usize * height as usize,
        "Depth map is {}x{} but carries {} values",
        width,
        height,
        values.len()
    );
    DepthMap::from_raw(width, height, values).ok_or_else(|| anyhow!("Invalid depth map buffer"))
}

/// Bring a depth map to the source image's resolution by nearest-neighbour
/// sampling. imageops filters clamp float samples to [0, 1], which would
/// flatten relative depth.
fn to_source_resolution(map: DepthMap, width: u32, height: u32) -> DepthMap {
    let (src_width, src_height) = map.dimensions();
    if (src_width, src_height) == (width, height) || src_width == 0 || src_height == 0 {
        return map;
    }
    debug!(
        "Resizing depth map from {}x{} to source {}x{}",
        src_width, src_height, width, height
    );
    DepthMap::from_fn(width, height, |x, y| {
        let src_x = u64::from(x) * u64::from(src_width) / u64::from(width);
        let src_y = u64::from(y) * u64::from(src_height) / u64::from(height);
        *map.get_pixel(src_x as u32, src_y as u32)
    })
}

fn into_mask(response: SegmentResponse) -> anyhow::Result<GrayImage> {
    let SegmentResponse { width, height, classes } = response;
    ensure!(
        classes.len() == width as usize * height as usize,
        "Segmentation mask is {}x{} but carries {} classes",
        width,
        height,
        classes.len()
    );
    GrayImage::from_raw(width, height, classes).ok_or_else(|| anyhow!("Invalid segmentation buffer"))
}

#[async_trait]
impl ObjectDetector for InferenceClient {
    async fn detect(&self, image: &DynamicImage) -> anyhow::Result<Vec<Detection>> {
        let image = encode_image(image)?;

        let object_request = ImageRequest { image: &image };
        let crack_request = CrackRequest {
            image: &image,
            min_confidence: CRACK_MIN_CONFIDENCE,
        };

        let (objects, cracks) = tokio::join!(
            self.post::<_, DetectResponse>("detect", &object_request),
            self.post::<_, DetectResponse>("detect-cracks", &crack_request),
        );

        let mut detections = into_detections(objects?, false);
        // objects calibrate the room, cracks are only reported
        match cracks {
            Ok(cracks) => detections.extend(into_detections(cracks, true)),
            Err(e) => warn!("Crack detection failed, reporting objects only: {:#}", e),
        }

        Ok(detections)
    }

    fn model_info(&self) -> String {
        format!("sidecar {}/detect", self.base_url)
    }
}

#[async_trait]
impl DepthEstimator for InferenceClient {
    async fn estimate_depth(&self, image: &DynamicImage) -> anyhow::Result<DepthMap> {
        let encoded = encode_image(image)?;
        let response: DepthResponse = self.post("depth", &ImageRequest { image: &encoded }).await?;
        let map = into_depth_map(response)?;
        Ok(to_source_resolution(map, image.width(), image.height()))
    }

    fn model_info(&self) -> String {
        format!("sidecar {}/depth", self.base_url)
    }
}

#[async_trait]
impl FloorSegmenter for InferenceClient {
    async fn segment(&self, image: &DynamicImage) -> anyhow::Result<GrayImage> {
        let image = encode_image(image)?;
        let response: SegmentResponse = self.post("segment", &ImageRequest { image: &image }).await?;
        into_mask(response)
    }

    fn model_info(&self) -> String {
        format!("sidecar {}/segment", self.base_url)
    }
}

#[async_trait]
impl SceneClassifier for InferenceClient {
    async fn classify(&self, image: &DynamicImage, labels: &[&str]) -> anyhow::Result<Vec<f64>> {
        let image = encode_image(image)?;
        let response: ClassifyResponse = self
            .post("classify", &ClassifyRequest { image: &image, labels })
            .await?;

        ensure!(
            response.probabilities.len() == labels.len(),
            "Classifier returned {} probabilities for {} labels",
            response.probabilities.len(),
            labels.len()
        );
        Ok(response.probabilities)
    }

    fn model_info(&self) -> String {
        format!("sidecar {}/classify", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    fn raw(label: &str, bbox: [f64; 4]) -> RawDetection {
        RawDetection {
            label: label.to_string(),
            confidence: 0.9,
            bbox,
        }
    }

    #[test]
    fn test_detections_converted_to_xywh() {
        let response = DetectResponse {
            detections: vec![raw("bed", [10.0, 20.0, 110.0, 220.0]), raw("chair", [0.0, f64::NAN, 1.0, 1.0])],
        };
        let detections = into_detections(response, false);

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].bbox, [10.0, 20.0, 100.0, 200.0]);
        assert!(!detections[0].is_crack);
    }

    #[test]
    fn test_cracks_are_flagged() {
        let response = DetectResponse {
            detections: vec![raw("crack", [5.0, 5.0, 8.0, 60.0])],
        };
        let detections = into_detections(response, true);

        assert_eq!(detections[0].label, "Structural Crack");
        assert!(detections[0].is_crack);
        assert_eq!(detections[0].bbox, [5.0, 5.0, 3.0, 55.0]);
    }

    #[test]
    fn test_buffer_size_mismatch_is_an_error() {
        let depth = DepthResponse { width: 2, height: 2, values: vec![0.0; 3] };
        assert!(into_depth_map(depth).is_err());

        let mask = SegmentResponse { width: 3, height: 2, classes: vec![3, 3, 0] };
        assert!(into_mask(mask).is_err());
    }

    #[test]
    fn test_well_formed_mask_is_accepted() {
        let mask = SegmentResponse { width: 3, height: 1, classes: vec![3, 3, 0] };
        let mask = into_mask(mask).unwrap();
        assert_eq!(mask.dimensions(), (3, 1));
        assert_eq!(mask.get_pixel(1, 0)[0], 3);
        assert_eq!(mask.get_pixel(2, 0)[0], 0);
    }

    #[test]
    fn test_depth_map_resized_to_source() {
        let depth = DepthResponse { width: 2, height: 1, values: vec![0.5, 3.5] };
        let map = to_source_resolution(into_depth_map(depth).unwrap(), 4, 4);

        assert_eq!(map.dimensions(), (4, 4));
        assert_eq!(map.get_pixel(0, 3)[0], 0.5);
        assert_eq!(map.get_pixel(3, 0)[0], 3.5);

        let same = DepthMap::from_pixel(4, 4, image::Luma([1.0]));
        assert_eq!(to_source_resolution(same.clone(), 4, 4), same);
    }

    #[test]
    fn test_encoded_image_is_decodable_png() {
        let encoded = encode_image(&DynamicImage::new_luma8(7, 5)).unwrap();
        let bytes = general_purpose::STANDARD.decode(encoded).unwrap();
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (7, 5));
    }

    async fn fake_sidecar(cracks_fail: bool) -> InferenceClient {
        let app = Router::new()
            .route(
                "/detect",
                post(|Json(body): Json<Value>| async move {
                    assert!(body["image"].is_string());
                    Json(json!({"detections": [{"label": "bed", "confidence": 0.9, "bbox": [0, 0, 100, 200]}]}))
                }),
            )
            .route(
                "/detect-cracks",
                post(move |Json(body): Json<Value>| async move {
                    if cracks_fail {
                        return Err((StatusCode::INTERNAL_SERVER_ERROR, "crack model offline"));
                    }
                    assert_eq!(body["min_confidence"], 0.15);
                    Ok(Json(json!({"detections": [{"label": "crack", "confidence": 0.2, "bbox": [1, 1, 2, 40]}]})))
                }),
            )
            .route(
                "/depth",
                post(|| async { Json(json!({"width": 2, "height": 1, "values": [0.5, 3.5]})) }),
            )
            .route(
                "/segment",
                post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "loading") }),
            )
            .route(
                "/classify",
                post(|Json(body): Json<Value>| async move {
                    let n = body["labels"].as_array().map_or(0, Vec::len);
                    Json(json!({"probabilities": vec![1.0 / n as f64; n]}))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        InferenceClient::new(format!("http://{}/", addr), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_sidecar_round_trip() {
        let client = fake_sidecar(false).await;
        let image = DynamicImage::new_rgb8(4, 4);

        let detections = client.detect(&image).await.unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].label, "bed");
        assert!(detections[1].is_crack);
        assert_eq!(detections[1].bbox, [1.0, 1.0, 1.0, 39.0]);

        // sidecar answered 2x1; the map comes back at source resolution
        let depth = client.estimate_depth(&image).await.unwrap();
        assert_eq!(depth.dimensions(), (4, 4));

        let probabilities = client.classify(&image, &["a", "b", "c", "d"]).await.unwrap();
        assert_eq!(probabilities, vec![0.25; 4]);

        let err = client.segment(&image).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_crack_failure_keeps_objects() {
        let client = fake_sidecar(true).await;
        let detections = client.detect(&DynamicImage::new_rgb8(4, 4)).await.unwrap();
        assert_eq!(detections.len(), 1);
        assert!(!detections[0].is_crack);
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = InferenceClient::new("http://models:8001///", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://models:8001");
    }
}
